//! Framework types the analysed sources reference but do not declare.
//!
//! Each member carries built-in ownership knowledge: factories that always
//! hand out a new instance are `Created`, accessors into collections,
//! caches and parents are `NotOwned`. Everything else stays `Unspecified`
//! and is classified from its type. Catalog symbols have no declarations,
//! which is how the analyses recognise external code.

use super::symbols::{Generics, SymbolTable};
use super::{Ownership, SymbolId, SymbolKind, TypeRef};
use crate::syntax::{Accessibility, ParameterModifier, TypeKind, TypeSyntax};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Member {
    Method,
    Property,
    Field,
    Constructor,
}

#[derive(Debug, Clone, Copy)]
struct MemberSpec {
    kind: Member,
    name: &'static str,
    /// Return or value type; empty for `void` and enum values.
    ty: &'static str,
    /// Parameter types, optionally prefixed with `out `, `ref `, `this `,
    /// `params ` or `opt ` (has a default value).
    params: &'static [&'static str],
    type_params: &'static [&'static str],
    ownership: Ownership,
    is_static: bool,
    settable: bool,
    extension: bool,
}

const fn member(
    kind: Member,
    name: &'static str,
    ty: &'static str,
    params: &'static [&'static str],
) -> MemberSpec {
    MemberSpec {
        kind,
        name,
        ty,
        params,
        type_params: &[],
        ownership: Ownership::Unspecified,
        is_static: false,
        settable: false,
        extension: false,
    }
}

const fn method(name: &'static str, params: &'static [&'static str], returns: &'static str) -> MemberSpec {
    member(Member::Method, name, returns, params)
}

const fn prop(name: &'static str, ty: &'static str) -> MemberSpec {
    member(Member::Property, name, ty, &[])
}

const fn indexer(params: &'static [&'static str], ty: &'static str) -> MemberSpec {
    member(Member::Property, "this[]", ty, params)
}

const fn field(name: &'static str, ty: &'static str) -> MemberSpec {
    member(Member::Field, name, ty, &[])
}

/// Enum value; typed as the enum itself.
const fn value(name: &'static str) -> MemberSpec {
    member(Member::Field, name, "", &[])
}

const fn ctor(params: &'static [&'static str]) -> MemberSpec {
    member(Member::Constructor, ".ctor", "", params)
}

impl MemberSpec {
    const fn created(self) -> Self {
        MemberSpec {
            ownership: Ownership::Created,
            ..self
        }
    }

    const fn not_owned(self) -> Self {
        MemberSpec {
            ownership: Ownership::NotOwned,
            ..self
        }
    }

    /// Static member.
    const fn shared(self) -> Self {
        MemberSpec {
            is_static: true,
            ..self
        }
    }

    const fn settable(self) -> Self {
        MemberSpec {
            settable: true,
            ..self
        }
    }

    const fn generic(self, type_params: &'static [&'static str]) -> Self {
        MemberSpec {
            type_params,
            ..self
        }
    }

    const fn extension(self) -> Self {
        MemberSpec {
            extension: true,
            is_static: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TypeSpec {
    namespace: &'static str,
    name: &'static str,
    params: &'static [&'static str],
    kind: TypeKind,
    is_static: bool,
    bases: &'static [&'static str],
    members: &'static [MemberSpec],
}

const fn class(
    namespace: &'static str,
    name: &'static str,
    bases: &'static [&'static str],
    members: &'static [MemberSpec],
) -> TypeSpec {
    TypeSpec {
        namespace,
        name,
        params: &[],
        kind: TypeKind::Class,
        is_static: false,
        bases,
        members,
    }
}

impl TypeSpec {
    const fn generic(self, params: &'static [&'static str]) -> Self {
        TypeSpec { params, ..self }
    }

    const fn interface(self) -> Self {
        TypeSpec {
            kind: TypeKind::Interface,
            ..self
        }
    }

    const fn structure(self) -> Self {
        TypeSpec {
            kind: TypeKind::Struct,
            ..self
        }
    }

    const fn enumeration(self) -> Self {
        TypeSpec {
            kind: TypeKind::Enum,
            ..self
        }
    }

    const fn shared(self) -> Self {
        TypeSpec {
            is_static: true,
            ..self
        }
    }
}

const SYSTEM: &str = "System";
const IO: &str = "System.IO";
const HTTP: &str = "System.Net.Http";
const THREADING: &str = "System.Threading";
const TASKS: &str = "System.Threading.Tasks";
const GENERIC: &str = "System.Collections.Generic";
const CONCURRENT: &str = "System.Collections.Concurrent";

static CATALOG: &[TypeSpec] = &[
    // System
    class(SYSTEM, "Object", &[], &[
        method("ToString", &[], "string"),
        method("GetHashCode", &[], "int"),
        method("Equals", &["object"], "bool"),
        method("GetType", &[], "Type"),
    ]),
    class(SYSTEM, "String", &["IEnumerable<char>"], &[
        prop("Length", "int"),
        field("Empty", "string").shared(),
        method("Format", &["string", "params object[]"], "string").shared(),
        method("Concat", &["params object[]"], "string").shared(),
        method("IsNullOrEmpty", &["string"], "bool").shared(),
        method("Substring", &["int", "opt int"], "string"),
        method("Trim", &[], "string"),
    ]),
    class(SYSTEM, "Boolean", &[], &[]).structure(),
    class(SYSTEM, "Byte", &[], &[]).structure(),
    class(SYSTEM, "SByte", &[], &[]).structure(),
    class(SYSTEM, "Char", &[], &[]).structure(),
    class(SYSTEM, "Decimal", &[], &[]).structure(),
    class(SYSTEM, "Double", &[], &[]).structure(),
    class(SYSTEM, "Single", &[], &[]).structure(),
    class(SYSTEM, "Int16", &[], &[]).structure(),
    class(SYSTEM, "UInt16", &[], &[]).structure(),
    class(SYSTEM, "Int32", &[], &[
        method("Parse", &["string"], "int").shared(),
        field("MaxValue", "int").shared(),
    ]).structure(),
    class(SYSTEM, "UInt32", &[], &[]).structure(),
    class(SYSTEM, "Int64", &[], &[]).structure(),
    class(SYSTEM, "UInt64", &[], &[]).structure(),
    class(SYSTEM, "IntPtr", &[], &[field("Zero", "IntPtr").shared()]).structure(),
    class(SYSTEM, "UIntPtr", &[], &[]).structure(),
    class(SYSTEM, "ValueTuple", &[], &[]).structure(),
    class(SYSTEM, "Type", &[], &[prop("Name", "string")]),
    class(SYSTEM, "Uri", &[], &[ctor(&["string"])]),
    class(SYSTEM, "Guid", &[], &[method("NewGuid", &[], "Guid").shared()]).structure(),
    class(SYSTEM, "TimeSpan", &[], &[
        method("FromSeconds", &["double"], "TimeSpan").shared(),
        method("FromMilliseconds", &["double"], "TimeSpan").shared(),
        field("Zero", "TimeSpan").shared(),
    ]).structure(),
    class(SYSTEM, "DateTime", &[], &[prop("Now", "DateTime").shared(), prop("UtcNow", "DateTime").shared()]).structure(),
    class(SYSTEM, "IDisposable", &[], &[method("Dispose", &[], "")]).interface(),
    class(SYSTEM, "IAsyncDisposable", &[], &[method("DisposeAsync", &[], "ValueTask")]).interface(),
    class(SYSTEM, "IServiceProvider", &[], &[method("GetService", &["Type"], "object").not_owned()]).interface(),
    class(SYSTEM, "Array", &["IList<T>", "IReadOnlyList<T>"], &[
        prop("Length", "int"),
        indexer(&["int"], "T").not_owned().settable(),
    ]).generic(&["T"]),
    class(SYSTEM, "Exception", &[], &[ctor(&[]), ctor(&["string"]), ctor(&["string", "Exception"]), prop("Message", "string")]),
    class(SYSTEM, "ArgumentException", &["Exception"], &[ctor(&[]), ctor(&["string"]), ctor(&["string", "string"])]),
    class(SYSTEM, "ArgumentNullException", &["ArgumentException"], &[ctor(&[]), ctor(&["string"])]),
    class(SYSTEM, "InvalidOperationException", &["Exception"], &[ctor(&[]), ctor(&["string"])]),
    class(SYSTEM, "NotSupportedException", &["Exception"], &[ctor(&[]), ctor(&["string"])]),
    class(SYSTEM, "ObjectDisposedException", &["InvalidOperationException"], &[ctor(&["string"])]),
    class(SYSTEM, "EventArgs", &[], &[field("Empty", "EventArgs").shared()]),
    class(SYSTEM, "EventHandler", &[], &[method("Invoke", &["object", "EventArgs"], "")]),
    class(SYSTEM, "Action", &[], &[method("Invoke", &[], "")]),
    class(SYSTEM, "Action", &[], &[method("Invoke", &["T"], "")]).generic(&["T"]),
    class(SYSTEM, "Func", &[], &[method("Invoke", &[], "TResult")]).generic(&["TResult"]),
    class(SYSTEM, "Func", &[], &[method("Invoke", &["T"], "TResult")]).generic(&["T", "TResult"]),
    class(SYSTEM, "Func", &[], &[method("Invoke", &["T1", "T2"], "TResult")]).generic(&["T1", "T2", "TResult"]),
    class(SYSTEM, "Lazy", &[], &[
        ctor(&["Func<T>"]),
        prop("Value", "T").not_owned(),
        prop("IsValueCreated", "bool"),
    ]).generic(&["T"]),
    class(SYSTEM, "GC", &[], &[method("SuppressFinalize", &["object"], "").shared()]).shared(),
    class(SYSTEM, "Console", &[], &[
        method("WriteLine", &["opt object"], "").shared(),
        method("ReadLine", &[], "string").shared(),
    ]).shared(),
    class(SYSTEM, "Environment", &[], &[prop("NewLine", "string").shared()]).shared(),

    // System.IO
    class(IO, "Stream", &["IDisposable", "IAsyncDisposable"], &[
        method("Read", &["byte[]", "int", "int"], "int"),
        method("Write", &["byte[]", "int", "int"], ""),
        method("Flush", &[], ""),
        method("CopyTo", &["Stream"], ""),
        method("CopyToAsync", &["Stream"], "Task"),
        method("Close", &[], ""),
        method("Dispose", &[], ""),
        method("DisposeAsync", &[], "ValueTask"),
        prop("Length", "long"),
        prop("Position", "long").settable(),
        prop("CanRead", "bool"),
        field("Null", "Stream").shared().not_owned(),
    ]),
    class(IO, "FileStream", &["Stream"], &[
        ctor(&["string", "FileMode"]),
        ctor(&["string", "FileMode", "FileAccess"]),
        prop("Name", "string"),
    ]),
    class(IO, "MemoryStream", &["Stream"], &[ctor(&[]), ctor(&["byte[]"]), method("ToArray", &[], "byte[]")]),
    class(IO, "BufferedStream", &["Stream"], &[ctor(&["Stream"])]),
    class(IO, "FileMode", &[], &[
        value("CreateNew"), value("Create"), value("Open"), value("OpenOrCreate"), value("Truncate"), value("Append"),
    ]).enumeration(),
    class(IO, "FileAccess", &[], &[value("Read"), value("Write"), value("ReadWrite")]).enumeration(),
    class(IO, "File", &[], &[
        method("OpenRead", &["string"], "FileStream").shared().created(),
        method("OpenWrite", &["string"], "FileStream").shared().created(),
        method("Create", &["string"], "FileStream").shared().created(),
        method("Open", &["string", "FileMode", "opt FileAccess"], "FileStream").shared().created(),
        method("OpenText", &["string"], "StreamReader").shared().created(),
        method("CreateText", &["string"], "StreamWriter").shared().created(),
        method("AppendText", &["string"], "StreamWriter").shared().created(),
        method("ReadAllText", &["string"], "string").shared(),
        method("ReadAllBytes", &["string"], "byte[]").shared(),
        method("WriteAllText", &["string", "string"], "").shared(),
        method("Exists", &["string"], "bool").shared(),
        method("Delete", &["string"], "").shared(),
    ]).shared(),
    class(IO, "FileInfo", &[], &[
        ctor(&["string"]),
        method("OpenRead", &[], "FileStream").created(),
        method("Create", &[], "FileStream").created(),
        prop("FullName", "string"),
    ]),
    class(IO, "Path", &[], &[
        method("Combine", &["string", "string"], "string").shared(),
        method("GetFileName", &["string"], "string").shared(),
    ]).shared(),
    class(IO, "TextReader", &["IDisposable"], &[
        method("ReadLine", &[], "string"),
        method("ReadToEnd", &[], "string"),
        method("Dispose", &[], ""),
    ]),
    class(IO, "StreamReader", &["TextReader"], &[
        ctor(&["Stream"]),
        ctor(&["string"]),
        ctor(&["Stream", "bool"]),
        prop("BaseStream", "Stream").not_owned(),
    ]),
    class(IO, "StringReader", &["TextReader"], &[ctor(&["string"])]),
    class(IO, "TextWriter", &["IDisposable", "IAsyncDisposable"], &[
        method("Write", &["string"], ""),
        method("WriteLine", &["opt string"], ""),
        method("Flush", &[], ""),
        method("Dispose", &[], ""),
    ]),
    class(IO, "StreamWriter", &["TextWriter"], &[
        ctor(&["Stream"]),
        ctor(&["string"]),
        prop("BaseStream", "Stream").not_owned(),
    ]),
    class(IO, "StringWriter", &["TextWriter"], &[ctor(&[])]),
    class(IO, "BinaryReader", &["IDisposable"], &[
        ctor(&["Stream"]),
        prop("BaseStream", "Stream").not_owned(),
        method("ReadInt32", &[], "int"),
    ]),
    class(IO, "BinaryWriter", &["IDisposable"], &[
        ctor(&["Stream"]),
        prop("BaseStream", "Stream").not_owned(),
        method("Write", &["int"], ""),
    ]),
    class("System.IO.Compression", "CompressionMode", &[], &[value("Decompress"), value("Compress")]).enumeration(),
    class("System.IO.Compression", "GZipStream", &["Stream"], &[
        ctor(&["Stream", "CompressionMode"]),
        ctor(&["Stream", "CompressionMode", "bool"]),
        prop("BaseStream", "Stream").not_owned(),
    ]),

    // System.Net.Http
    class(HTTP, "HttpMessageInvoker", &["IDisposable"], &[method("Dispose", &[], "")]),
    class(HTTP, "HttpMessageHandler", &["IDisposable"], &[method("Dispose", &[], "")]),
    class(HTTP, "HttpClientHandler", &["HttpMessageHandler"], &[ctor(&[])]),
    class(HTTP, "HttpClient", &["HttpMessageInvoker"], &[
        ctor(&[]),
        ctor(&["HttpMessageHandler", "opt bool"]),
        method("GetAsync", &["string"], "Task<HttpResponseMessage>").created(),
        method("SendAsync", &["HttpRequestMessage"], "Task<HttpResponseMessage>").created(),
        method("PostAsync", &["string", "HttpContent"], "Task<HttpResponseMessage>").created(),
        method("GetStreamAsync", &["string"], "Task<Stream>").created(),
        method("GetStringAsync", &["string"], "Task<string>"),
        prop("BaseAddress", "Uri").settable(),
    ]),
    class(HTTP, "HttpResponseMessage", &["IDisposable"], &[
        prop("Content", "HttpContent").not_owned(),
        prop("IsSuccessStatusCode", "bool"),
        method("EnsureSuccessStatusCode", &[], "HttpResponseMessage").not_owned(),
        method("Dispose", &[], ""),
    ]),
    class(HTTP, "HttpRequestMessage", &["IDisposable"], &[ctor(&[]), prop("Content", "HttpContent").not_owned().settable()]),
    class(HTTP, "HttpContent", &["IDisposable"], &[
        method("ReadAsStreamAsync", &[], "Task<Stream>").not_owned(),
        method("ReadAsStringAsync", &[], "Task<string>"),
        method("Dispose", &[], ""),
    ]),
    class(HTTP, "StringContent", &["HttpContent"], &[ctor(&["string"])]),
    class(HTTP, "IHttpClientFactory", &[], &[method("CreateClient", &["string"], "HttpClient")]).interface(),

    // System.Threading
    class(THREADING, "CancellationTokenSource", &["IDisposable"], &[
        ctor(&[]),
        ctor(&["TimeSpan"]),
        prop("Token", "CancellationToken"),
        prop("IsCancellationRequested", "bool"),
        method("Cancel", &[], ""),
        method("CancelAfter", &["TimeSpan"], ""),
        method("CreateLinkedTokenSource", &["params CancellationToken[]"], "CancellationTokenSource").shared().created(),
        method("Dispose", &[], ""),
    ]),
    class(THREADING, "CancellationToken", &[], &[
        prop("None", "CancellationToken").shared(),
        prop("IsCancellationRequested", "bool"),
        method("ThrowIfCancellationRequested", &[], ""),
        method("Register", &["Action"], "CancellationTokenRegistration").created(),
    ]).structure(),
    class(THREADING, "CancellationTokenRegistration", &["IDisposable"], &[method("Dispose", &[], "")]).structure(),
    class(THREADING, "SemaphoreSlim", &["IDisposable"], &[
        ctor(&["int", "opt int"]),
        method("Wait", &[], ""),
        method("WaitAsync", &[], "Task"),
        method("Release", &[], "int"),
        method("Dispose", &[], ""),
    ]),
    class(THREADING, "ManualResetEventSlim", &["IDisposable"], &[
        ctor(&["opt bool"]),
        method("Set", &[], ""),
        method("Wait", &[], ""),
        method("Dispose", &[], ""),
    ]),
    class(THREADING, "Interlocked", &[], &[
        method("Exchange", &["ref T", "T"], "T").generic(&["T"]).shared().not_owned(),
        method("Increment", &["ref int"], "int").shared(),
    ]).shared(),

    // System.Threading.Tasks
    class(TASKS, "Task", &[], &[
        method("Run", &["Func<TResult>"], "Task<TResult>").generic(&["TResult"]).shared(),
        method("Delay", &["int"], "Task").shared(),
        method("FromResult", &["TResult"], "Task<TResult>").generic(&["TResult"]).shared(),
        method("WhenAll", &["params Task[]"], "Task").shared(),
        prop("CompletedTask", "Task").shared(),
        method("ConfigureAwait", &["bool"], "Task"),
        method("Wait", &[], ""),
    ]),
    class(TASKS, "Task", &["Task"], &[
        prop("Result", "TResult"),
        method("ConfigureAwait", &["bool"], "Task<TResult>"),
    ]).generic(&["TResult"]),
    class(TASKS, "ValueTask", &[], &[method("ConfigureAwait", &["bool"], "ValueTask")]).structure(),
    class(TASKS, "ValueTask", &[], &[
        prop("Result", "TResult"),
        method("ConfigureAwait", &["bool"], "ValueTask<TResult>"),
    ]).generic(&["TResult"]).structure(),
    class(TASKS, "TaskCompletionSource", &[], &[
        ctor(&[]),
        prop("Task", "Task<TResult>"),
        method("SetResult", &["TResult"], ""),
    ]).generic(&["TResult"]),

    // System.Collections.Generic
    class(GENERIC, "IEnumerable", &[], &[method("GetEnumerator", &[], "IEnumerator<T>").not_owned()]).generic(&["T"]).interface(),
    class(GENERIC, "IEnumerator", &["IDisposable"], &[prop("Current", "T").not_owned(), method("MoveNext", &[], "bool")]).generic(&["T"]).interface(),
    class(GENERIC, "ICollection", &["IEnumerable<T>"], &[
        prop("Count", "int"),
        method("Add", &["T"], ""),
        method("Remove", &["T"], "bool"),
        method("Clear", &[], ""),
        method("Contains", &["T"], "bool"),
    ]).generic(&["T"]).interface(),
    class(GENERIC, "IList", &["ICollection<T>"], &[
        indexer(&["int"], "T").not_owned().settable(),
        method("IndexOf", &["T"], "int"),
    ]).generic(&["T"]).interface(),
    class(GENERIC, "IReadOnlyList", &["IEnumerable<T>"], &[
        indexer(&["int"], "T").not_owned(),
        prop("Count", "int"),
    ]).generic(&["T"]).interface(),
    class(GENERIC, "List", &["IList<T>", "IReadOnlyList<T>"], &[
        ctor(&[]),
        ctor(&["int"]),
        ctor(&["IEnumerable<T>"]),
        indexer(&["int"], "T").not_owned().settable(),
        prop("Count", "int"),
        method("Add", &["T"], ""),
        method("AddRange", &["IEnumerable<T>"], ""),
        method("Insert", &["int", "T"], ""),
        method("Remove", &["T"], "bool"),
        method("RemoveAt", &["int"], ""),
        method("Clear", &[], ""),
        method("Contains", &["T"], "bool"),
        method("Find", &["Func<T, bool>"], "T").not_owned(),
        method("ToArray", &[], "T[]").not_owned(),
    ]).generic(&["T"]),
    class(GENERIC, "KeyValuePair", &[], &[
        prop("Key", "TKey").not_owned(),
        prop("Value", "TValue").not_owned(),
    ]).generic(&["TKey", "TValue"]).structure(),
    class(GENERIC, "IDictionary", &["ICollection<KeyValuePair<TKey, TValue>>"], &[
        indexer(&["TKey"], "TValue").not_owned().settable(),
        method("TryGetValue", &["TKey", "out TValue"], "bool").not_owned(),
        method("Add", &["TKey", "TValue"], ""),
        method("ContainsKey", &["TKey"], "bool"),
        method("Remove", &["TKey"], "bool"),
        prop("Keys", "ICollection<TKey>"),
        prop("Values", "ICollection<TValue>"),
    ]).generic(&["TKey", "TValue"]).interface(),
    class(GENERIC, "IReadOnlyDictionary", &["IEnumerable<KeyValuePair<TKey, TValue>>"], &[
        indexer(&["TKey"], "TValue").not_owned(),
        method("TryGetValue", &["TKey", "out TValue"], "bool").not_owned(),
        method("ContainsKey", &["TKey"], "bool"),
    ]).generic(&["TKey", "TValue"]).interface(),
    class(GENERIC, "Dictionary", &["IDictionary<TKey, TValue>", "IReadOnlyDictionary<TKey, TValue>"], &[
        ctor(&[]),
        indexer(&["TKey"], "TValue").not_owned().settable(),
        method("TryGetValue", &["TKey", "out TValue"], "bool").not_owned(),
        method("TryAdd", &["TKey", "TValue"], "bool"),
        method("Add", &["TKey", "TValue"], ""),
        method("ContainsKey", &["TKey"], "bool"),
        method("Remove", &["TKey"], "bool"),
        method("Clear", &[], ""),
        prop("Count", "int"),
        prop("Keys", "ICollection<TKey>"),
        prop("Values", "ICollection<TValue>"),
    ]).generic(&["TKey", "TValue"]),
    class(GENERIC, "HashSet", &["ICollection<T>"], &[ctor(&[]), method("Add", &["T"], "bool")]).generic(&["T"]),
    class(GENERIC, "Queue", &["IEnumerable<T>"], &[
        ctor(&[]),
        method("Enqueue", &["T"], ""),
        method("Dequeue", &[], "T").not_owned(),
        method("Peek", &[], "T").not_owned(),
        method("TryDequeue", &["out T"], "bool").not_owned(),
        prop("Count", "int"),
    ]).generic(&["T"]),
    class(GENERIC, "Stack", &["IEnumerable<T>"], &[
        ctor(&[]),
        method("Push", &["T"], ""),
        method("Pop", &[], "T").not_owned(),
        method("Peek", &[], "T").not_owned(),
        prop("Count", "int"),
    ]).generic(&["T"]),

    // System.Collections.Concurrent
    class(CONCURRENT, "ConcurrentDictionary", &["IDictionary<TKey, TValue>"], &[
        ctor(&[]),
        indexer(&["TKey"], "TValue").not_owned().settable(),
        method("TryGetValue", &["TKey", "out TValue"], "bool").not_owned(),
        method("GetOrAdd", &["TKey", "Func<TKey, TValue>"], "TValue").not_owned(),
        method("AddOrUpdate", &["TKey", "TValue", "Func<TKey, TValue, TValue>"], "TValue").not_owned(),
        method("TryAdd", &["TKey", "TValue"], "bool"),
        method("TryRemove", &["TKey", "out TValue"], "bool"),
    ]).generic(&["TKey", "TValue"]),
    class(CONCURRENT, "ConcurrentQueue", &["IEnumerable<T>"], &[
        ctor(&[]),
        method("Enqueue", &["T"], ""),
        method("TryDequeue", &["out T"], "bool").not_owned(),
    ]).generic(&["T"]),

    // System.Linq
    class("System.Linq", "Enumerable", &[], &[
        method("First", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("FirstOrDefault", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("Last", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("LastOrDefault", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("Single", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("SingleOrDefault", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("ElementAt", &["this IEnumerable<TSource>", "int"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("ElementAtOrDefault", &["this IEnumerable<TSource>", "int"], "TSource").generic(&["TSource"]).extension().not_owned(),
        method("Where", &["this IEnumerable<TSource>", "Func<TSource, bool>"], "IEnumerable<TSource>").generic(&["TSource"]).extension().not_owned(),
        method("Select", &["this IEnumerable<TSource>", "Func<TSource, TResult>"], "IEnumerable<TResult>").generic(&["TSource", "TResult"]).extension().not_owned(),
        method("OrderBy", &["this IEnumerable<TSource>", "Func<TSource, TKey>"], "IEnumerable<TSource>").generic(&["TSource", "TKey"]).extension().not_owned(),
        method("ToList", &["this IEnumerable<TSource>"], "List<TSource>").generic(&["TSource"]).extension().not_owned(),
        method("ToArray", &["this IEnumerable<TSource>"], "TSource[]").generic(&["TSource"]).extension().not_owned(),
        method("Any", &["this IEnumerable<TSource>", "opt Func<TSource, bool>"], "bool").generic(&["TSource"]).extension(),
        method("Count", &["this IEnumerable<TSource>"], "int").generic(&["TSource"]).extension(),
    ]).shared(),

    // System.Runtime.CompilerServices
    class("System.Runtime.CompilerServices", "ConditionalWeakTable", &[], &[
        ctor(&[]),
        method("TryGetValue", &["TKey", "out TValue"], "bool").not_owned(),
        method("GetValue", &["TKey", "Func<TKey, TValue>"], "TValue").not_owned(),
        method("GetOrCreateValue", &["TKey"], "TValue").not_owned(),
        method("Add", &["TKey", "TValue"], ""),
        method("Remove", &["TKey"], "bool"),
    ]).generic(&["TKey", "TValue"]),

    // System.Diagnostics
    class("System.Diagnostics", "ProcessStartInfo", &[], &[ctor(&["opt string"]), prop("FileName", "string").settable()]),
    class("System.Diagnostics", "Process", &["IDisposable"], &[
        ctor(&[]),
        method("Start", &["string", "opt string"], "Process").shared().created(),
        method("Start", &[], "bool"),
        method("GetCurrentProcess", &[], "Process").shared(),
        method("Kill", &[], ""),
        method("WaitForExit", &[], ""),
        prop("StandardOutput", "StreamReader").not_owned(),
        prop("StandardInput", "StreamWriter").not_owned(),
        prop("ExitCode", "int"),
        method("Dispose", &[], ""),
    ]),
    class("System.Diagnostics", "Stopwatch", &[], &[
        method("StartNew", &[], "Stopwatch").shared(),
        prop("Elapsed", "TimeSpan"),
        method("Stop", &[], ""),
    ]),

    // System.Data
    class("System.Data", "IDataReader", &["IDisposable"], &[method("Read", &[], "bool")]).interface(),
    class("System.Data", "IDbCommand", &["IDisposable"], &[
        method("ExecuteReader", &[], "IDataReader").created(),
        method("ExecuteNonQuery", &[], "int"),
    ]).interface(),
    class("System.Data", "IDbConnection", &["IDisposable"], &[
        method("CreateCommand", &[], "IDbCommand").created(),
        method("Open", &[], ""),
        method("Close", &[], ""),
    ]).interface(),
    class("System.Data.Common", "DbDataReader", &["IDataReader", "IAsyncDisposable"], &[
        method("Read", &[], "bool"),
        method("GetString", &["int"], "string"),
        method("Dispose", &[], ""),
    ]),
    class("System.Data.Common", "DbCommand", &["IDbCommand", "IAsyncDisposable"], &[
        method("ExecuteReader", &[], "DbDataReader").created(),
        method("ExecuteReaderAsync", &[], "Task<DbDataReader>").created(),
        method("ExecuteNonQuery", &[], "int"),
        method("ExecuteScalar", &[], "object"),
        prop("CommandText", "string").settable(),
        prop("Connection", "DbConnection").not_owned().settable(),
        method("Dispose", &[], ""),
    ]),
    class("System.Data.Common", "DbConnection", &["IDbConnection", "IAsyncDisposable"], &[
        method("CreateCommand", &[], "DbCommand").created(),
        method("Open", &[], ""),
        method("OpenAsync", &[], "Task"),
        method("Close", &[], ""),
        prop("ConnectionString", "string").settable(),
        method("Dispose", &[], ""),
    ]),

    // Microsoft.Win32
    class("Microsoft.Win32", "RegistryKey", &["IDisposable"], &[
        method("OpenSubKey", &["string", "opt bool"], "RegistryKey").created(),
        method("CreateSubKey", &["string"], "RegistryKey").created(),
        method("GetValue", &["string"], "object"),
        method("SetValue", &["string", "object"], ""),
        method("Dispose", &[], ""),
    ]),
    class("Microsoft.Win32", "Registry", &[], &[
        field("CurrentUser", "RegistryKey").shared().not_owned(),
        field("LocalMachine", "RegistryKey").shared().not_owned(),
    ]).shared(),

    // System.Security / WPF
    class("System.Security", "SecureString", &["IDisposable"], &[ctor(&[]), method("Dispose", &[], "")]),
    class("System.Windows.Controls", "PasswordBox", &[], &[
        ctor(&[]),
        prop("SecurePassword", "SecureString").created(),
        prop("Password", "string").settable(),
    ]),

    // System.Text
    class("System.Text", "StringBuilder", &[], &[
        ctor(&[]),
        method("Append", &["object"], "StringBuilder").not_owned(),
        method("AppendLine", &["opt string"], "StringBuilder").not_owned(),
    ]),

    // Microsoft.Extensions.DependencyInjection
    class("Microsoft.Extensions.DependencyInjection", "ServiceProviderServiceExtensions", &[], &[
        method("GetService", &["this IServiceProvider"], "T").generic(&["T"]).extension().not_owned(),
        method("GetRequiredService", &["this IServiceProvider"], "T").generic(&["T"]).extension().not_owned(),
    ]).shared(),
];

/// Parse a catalog signature such as `Func<TKey, TValue>` or `byte[]`.
fn signature(text: &str) -> TypeSyntax {
    signature_at(text.trim()).0
}

fn signature_at(text: &str) -> (TypeSyntax, &str) {
    let end = text
        .find(|c: char| matches!(c, '<' | ',' | '>' | '['))
        .unwrap_or(text.len());
    let mut ty = TypeSyntax::named(text[..end].trim());
    let mut rest = &text[end..];
    if let Some(inner) = rest.strip_prefix('<') {
        rest = inner;
        loop {
            let (arg, after) = signature_at(rest.trim_start());
            ty.args.push(arg);
            rest = after.trim_start();
            match rest.strip_prefix(',') {
                Some(after) => rest = after,
                None => {
                    rest = rest.strip_prefix('>').unwrap_or(rest);
                    break;
                }
            }
        }
    }
    while let Some(after) = rest.strip_prefix("[]") {
        ty.rank += 1;
        rest = after;
    }
    (ty, rest)
}

/// Register every catalog type and member in `table`.
pub fn install(table: &mut SymbolTable) {
    let ids: Vec<SymbolId> = CATALOG
        .iter()
        .map(|spec| {
            let params = spec.params.iter().map(|p| p.to_string()).collect();
            let id = table.add_type(spec.namespace, None, spec.name, params, spec.kind);
            table.get_mut(id).modifiers.is_static = spec.is_static;
            id
        })
        .collect();

    for (spec, id) in CATALOG.iter().zip(ids) {
        let type_params = table.get(id).type_params.clone();
        let generics = Generics {
            type_params: &type_params,
            method_params: &[],
        };
        let bases = spec
            .bases
            .iter()
            .filter_map(|base| table.resolve(&signature(base), generics))
            .collect();
        table.get_mut(id).bases = bases;
        for member in spec.members {
            install_member(table, id, spec, member, &type_params);
        }
    }
    log::trace!("installed {} catalog types", CATALOG.len());
}

fn install_member(
    table: &mut SymbolTable,
    owner: SymbolId,
    spec: &TypeSpec,
    member: &MemberSpec,
    type_params: &[String],
) {
    let method_params: Vec<String> = member.type_params.iter().map(|p| p.to_string()).collect();
    let generics = Generics {
        type_params,
        method_params: &method_params,
    };
    let is_enum = spec.kind == TypeKind::Enum;
    let ty = if member.ty.is_empty() {
        is_enum.then(|| TypeRef::named(owner))
    } else {
        table.resolve(&signature(member.ty), generics)
    };
    let kind = match member.kind {
        Member::Method => SymbolKind::Method,
        Member::Property => SymbolKind::Property,
        Member::Field => SymbolKind::Field,
        Member::Constructor => SymbolKind::Constructor,
    };
    let id = table.add(kind, member.name, |s| {
        s.container = Some(owner);
        s.ty = ty;
        s.accessibility = Accessibility::Public;
        s.ownership = member.ownership;
        s.modifiers.is_static = member.is_static || is_enum;
        s.modifiers.is_const = is_enum;
        s.modifiers.readonly = kind == SymbolKind::Field && !member.settable;
        s.type_params = method_params.clone();
        s.is_extension = member.extension;
        s.has_getter = kind == SymbolKind::Property;
        s.has_setter = member.settable;
    });
    let params = member
        .params
        .iter()
        .map(|param| install_param(table, id, param, generics))
        .collect();
    table.get_mut(id).params = params;
    table.get_mut(owner).members.push(id);
}

fn install_param(
    table: &mut SymbolTable,
    owner: SymbolId,
    spec: &str,
    generics: Generics<'_>,
) -> SymbolId {
    let mut rest = spec;
    let mut modifier = ParameterModifier::None;
    let mut optional = false;
    loop {
        let (next, prefix_len) = if rest.starts_with("out ") {
            (ParameterModifier::Out, 4)
        } else if rest.starts_with("ref ") {
            (ParameterModifier::Ref, 4)
        } else if rest.starts_with("this ") {
            (ParameterModifier::This, 5)
        } else if rest.starts_with("params ") {
            (ParameterModifier::Params, 7)
        } else if rest.starts_with("opt ") {
            optional = true;
            rest = &rest[4..];
            continue;
        } else {
            break;
        };
        modifier = next;
        rest = &rest[prefix_len..];
    }
    let ty = table.resolve(&signature(rest), generics);
    table.add(SymbolKind::Parameter, "", |s| {
        s.container = Some(owner);
        s.ty = ty;
        s.param_modifier = modifier;
        s.has_default = optional;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed() -> SymbolTable {
        let mut table = SymbolTable::new();
        install(&mut table);
        table
    }

    #[test]
    fn signature_parses_nested_generics_and_arrays() {
        let ty = signature("Func<TKey, List<TValue>>[]");
        assert_eq!(ty.name, "Func");
        assert_eq!(ty.args.len(), 2);
        assert_eq!(ty.args[1].name, "List");
        assert_eq!(ty.args[1].args[0].name, "TValue");
        assert_eq!(ty.rank, 1);
    }

    #[test]
    fn factories_are_tagged_created() {
        let table = installed();
        let file = table.lookup_type("System.IO.File", 0).unwrap();
        let open_read = table.members_named(file, "OpenRead")[0];
        assert_eq!(table.get(open_read).ownership, Ownership::Created);
        assert!(table.get(open_read).is_static());
        assert!(table.get(open_read).is_external());
    }

    #[test]
    fn dictionary_indexer_is_not_owned_and_generic() {
        let table = installed();
        let dictionary = table.lookup_type("Dictionary", 2).unwrap();
        let indexer = table.members_named(dictionary, "this[]")[0];
        assert_eq!(table.get(indexer).ownership, Ownership::NotOwned);
        assert_eq!(table.get(indexer).ty, Some(TypeRef::Parameter(1)));
    }

    #[test]
    fn stream_types_reach_idisposable() {
        let table = installed();
        let disposable = table.lookup_type("System.IDisposable", 0).unwrap();
        let file_stream = table.lookup_type("FileStream", 0).unwrap();
        assert!(table.supertypes(file_stream).contains(&disposable));
        let reader = table.lookup_type("StreamReader", 0).unwrap();
        assert!(table.supertypes(reader).contains(&disposable));
    }

    #[test]
    fn generic_and_plain_task_coexist() {
        let table = installed();
        let task = table.lookup_type("Task", 0).unwrap();
        let task_of = table.lookup_type("Task", 1).unwrap();
        assert_ne!(task, task_of);
        assert_eq!(table.get(task_of).bases, vec![TypeRef::named(task)]);
    }

    #[test]
    fn extension_methods_keep_receiver_parameter() {
        let table = installed();
        let enumerable = table.lookup_type("System.Linq.Enumerable", 0).unwrap();
        let first = table.members_named(enumerable, "First")[0];
        let symbol = table.get(first);
        assert!(symbol.is_extension);
        let receiver = table.get(symbol.params[0]);
        assert_eq!(receiver.param_modifier, ParameterModifier::This);
        assert!(table.get(symbol.params[1]).has_default);
    }
}
