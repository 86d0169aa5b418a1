mod common;

use common::{compile, context, member};
use indoc::indoc;
use pretty_assertions::assert_eq;
use valuetrace::{
    build_report, find_dispose_method, is_member_disposed, AnalysisConfig, Finding, SemanticModel,
};

const CONNECTION: &str = indoc! {r#"
    using System;
    using System.IO;
    using System.Net.Http;

    namespace Net
    {
        public class Connection : IDisposable
        {
            private readonly HttpClient _client = new HttpClient();
            private readonly Stream _log;
            private Stream _buffer = new MemoryStream();

            public Connection(Stream log)
            {
                _log = log;
            }

            public void Dispose()
            {
                _client?.Dispose();
                _log.Dispose();
            }
        }
    }
"#};

#[test]
fn dispose_reaches_only_the_members_it_touches() {
    let model = compile(CONNECTION);
    let config = AnalysisConfig::default();
    let ctx = context(&model, &config);
    let ty = model.find_type("Net.Connection").unwrap();
    let dispose = find_dispose_method(&ctx, ty).unwrap();

    let disposed = |name: &str| is_member_disposed(&ctx, member(&model, "Net.Connection", name), dispose).unwrap();
    assert!(disposed("_client"));
    assert!(disposed("_log"));
    assert!(!disposed("_buffer"));
}

#[test]
fn report_flags_leaks_and_disposed_injections() {
    let model = compile(CONNECTION);
    let config = AnalysisConfig::default();
    let ctx = context(&model, &config);
    let report = build_report(&ctx).unwrap();

    let rows: Vec<(&str, Option<Finding>)> = report
        .members
        .iter()
        .map(|m| (m.member.as_str(), m.finding))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("_client", None),
            ("_log", Some(Finding::DisposingInjected)),
            ("_buffer", Some(Finding::DisposeMember)),
        ]
    );
    assert!(report.has_dispose_member_findings());
    assert!(report.members.iter().all(|m| m.type_name == "Net.Connection"));
}

#[test]
fn known_created_config_overrides_the_catalog() {
    let source = indoc! {r#"
        using System;
        using System.IO;

        class Cache : IDisposable
        {
            private Stream _shared = Stream.Null;

            public void Dispose() { }
        }
    "#};
    let model = compile(source);
    let config = AnalysisConfig {
        known_created: vec!["System.IO.Stream.Null".to_string()],
        ..AnalysisConfig::default()
    };
    let ctx = context(&model, &config);
    let report = build_report(&ctx).unwrap();
    assert_eq!(report.members.len(), 1);
    assert_eq!(report.members[0].finding, Some(Finding::DisposeMember));
}
