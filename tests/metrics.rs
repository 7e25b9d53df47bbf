use std::collections::HashSet;
use std::sync::Arc;

use folio::application::binding::METRIC_BINDING_FAILED_TOTAL;
use folio::application::render::{RenderPipeline, ViewRegistry};
use folio::application::routing::{METRIC_RESOLVE_TOTAL, RoutingConfig, RoutingService, request_url};
use folio::cache::{
    ChangeSet, FacadeConfig, FacadeService, METRIC_PENDING_CHANGES, METRIC_REBUILD_FAILED_TOTAL,
    METRIC_REBUILD_MS, METRIC_REBUILD_TOTAL, METRIC_VERSION,
};
use folio::domain::content::{ContentId, ContentRecord};
use folio::domain::content_types::ContentTypeDescriptor;
use folio::infra::render::JsonRenderInvoker;
use folio::infra::source::MemoryContentSource;
use folio::infra::telemetry;
use metrics_util::debugging::DebuggingRecorder;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn facade_routing_and_binding_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let source = Arc::new(MemoryContentSource::new(
        vec![
            ContentTypeDescriptor::root("page"),
            ContentTypeDescriptor::child("article", "page"),
        ],
        vec![
            ContentRecord::new(1, None, "Home", "page"),
            ContentRecord::new(2, Some(1), "Blog", "page").with_template("article"),
        ],
    ));
    let facade = Arc::new(FacadeService::new(
        FacadeConfig::default(),
        Arc::clone(&source) as _,
    ));

    // Full build, then a failed cycle, then a successful patch.
    facade.create_snapshot(false).await.expect("initial build");
    source.set_failing(true);
    facade.notify(ChangeSet::updated(ContentId(2)));
    assert!(facade.consume().await.is_err());
    source.set_failing(false);
    assert!(facade.consume().await.expect("retry"));

    let routing = RoutingService::new(RoutingConfig::default(), Arc::clone(&facade));
    let pipeline = RenderPipeline::new(
        ViewRegistry::new([("article".to_string(), "article".parse().expect("model"))]),
        Arc::new(JsonRenderInvoker),
    );

    let context = routing.begin_request(
        request_url("http", "localhost", "/blog").expect("url"),
        CancellationToken::new(),
    );
    let result = context.resolve().expect("resolve");
    assert!(
        pipeline
            .render(&result, context.snapshot(), context.cancellation())
            .is_err()
    );

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_REBUILD_TOTAL,
        METRIC_REBUILD_FAILED_TOTAL,
        METRIC_REBUILD_MS,
        METRIC_VERSION,
        METRIC_PENDING_CHANGES,
        METRIC_RESOLVE_TOTAL,
        METRIC_BINDING_FAILED_TOTAL,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
