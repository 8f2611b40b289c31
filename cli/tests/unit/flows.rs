//! Flow sequencing: transitions, cursor rules and contract errors.

#![allow(clippy::expect_used)]

use ephemera_cli::application::stage::{CompleteSetup, CreateInstance, DeploySpec, Stage};
use ephemera_cli::application::{AggregateFlow, ComposeDeployFlow, Flow, InstanceProvisionFlow};
use ephemera_cli::domain::FlowError;

use crate::mocks::{Harness, INSTANCE_ID, MemorySource, MockCloud, ScriptedConnector, fresh_record};

fn harness() -> Harness {
    Harness::new(MockCloud::default(), fresh_record(), ScriptedConnector::succeeding())
}

#[test]
fn provision_flow_starts_with_create_instance() {
    let ctx = harness().context();
    let flow = InstanceProvisionFlow::new(INSTANCE_ID, "plan-small");
    let stage = flow.initial_stage(&ctx).expect("initial stage");
    assert_eq!(stage.name(), "CreateInstance");
}

#[test]
fn provision_flow_needs_create_instance_outcome() {
    let ctx = harness().context();
    let flow = InstanceProvisionFlow::new(INSTANCE_ID, "plan-small");
    let unfinished = Stage::from(CreateInstance::new(INSTANCE_ID, "plan-small"));
    let err = flow.next_stage(&ctx, &unfinished).expect_err("no outcome yet");
    assert_eq!(
        err,
        FlowError::MissingOutcome {
            flow: InstanceProvisionFlow::NAME,
            stage: CreateInstance::NAME,
        }
    );
}

#[test]
fn provision_flow_ends_after_complete_setup() {
    let ctx = harness().context();
    let flow = InstanceProvisionFlow::new(INSTANCE_ID, "plan-small");
    let last = Stage::from(CompleteSetup::new(INSTANCE_ID));
    assert!(flow.next_stage(&ctx, &last).expect("transition").is_none());
}

#[test]
fn deploy_flow_rejects_foreign_stage() {
    let ctx = harness().context();
    let flow = ComposeDeployFlow::new(INSTANCE_ID, DeploySpec::default());
    let foreign = Stage::from(CompleteSetup::new(INSTANCE_ID));
    let err = flow.next_stage(&ctx, &foreign).expect_err("foreign stage");
    assert_eq!(
        err,
        FlowError::UnexpectedStage {
            flow: ComposeDeployFlow::NAME,
            stage: CompleteSetup::NAME,
        }
    );
}

#[test]
fn empty_aggregate_is_rejected() {
    let err = AggregateFlow::new(Vec::new()).expect_err("empty");
    assert_eq!(err, FlowError::Empty);
}

#[test]
fn aggregate_advances_into_next_flow() {
    let ctx = harness().context();
    let mut aggregate = AggregateFlow::single(InstanceProvisionFlow::new(INSTANCE_ID, "plan"))
        .then(ComposeDeployFlow::new(INSTANCE_ID, DeploySpec::default()));
    assert_eq!(
        aggregate.flow_names().collect::<Vec<_>>(),
        vec!["InstanceProvisionFlow", "ComposeDeployFlow"]
    );

    let last = Stage::from(CompleteSetup::new(INSTANCE_ID));
    let next = aggregate
        .next_stage(&ctx, &last)
        .expect("transition")
        .expect("deploy stage");
    assert_eq!(next.name(), "DeployCompose");
    assert_eq!(aggregate.cursor(), 1);
}

#[test]
fn aggregate_initial_stage_is_only_available_before_advancing() {
    let ctx = harness().context();
    let mut aggregate = AggregateFlow::single(InstanceProvisionFlow::new(INSTANCE_ID, "plan"))
        .then(ComposeDeployFlow::new(INSTANCE_ID, DeploySpec::default()));
    aggregate.initial_stage(&ctx).expect("first call");

    let last = Stage::from(CompleteSetup::new(INSTANCE_ID));
    aggregate.next_stage(&ctx, &last).expect("advance");
    let err = aggregate.initial_stage(&ctx).expect_err("cursor moved");
    assert_eq!(err, FlowError::InvalidState { cursor: 1 });
}

#[test]
fn single_flow_aggregate_finishes_with_none() {
    let ctx = harness().context();
    let mut aggregate = AggregateFlow::single(InstanceProvisionFlow::new(INSTANCE_ID, "plan"));
    let last = Stage::from(CompleteSetup::new(INSTANCE_ID));
    assert!(aggregate.next_stage(&ctx, &last).expect("transition").is_none());
    assert!(aggregate.next_stage(&ctx, &last).expect("exhausted").is_none());
}

const PROJECT_COMPOSE: &str = "services:
  web:
    build: .
    env_file: ./web.env
    volumes:
      - ./static:/usr/share/nginx/html:ro
      - /var/run/docker.sock:/var/run/docker.sock
";

#[tokio::test]
async fn deploy_flow_collects_project_files() {
    let source = MemorySource::new(&[
        ("app/docker-compose.yml", PROJECT_COMPOSE),
        ("app/Dockerfile", "FROM nginx\n"),
        ("app/web.env", "MODE=preview\n"),
        ("app/static/index.html", "<h1>hi</h1>"),
        ("app/static/css/site.css", "h1 {}"),
        ("unrelated.txt", "ignored"),
    ]);
    let flow = ComposeDeployFlow::from_sources(
        &source,
        INSTANCE_ID,
        vec!["app/docker-compose.yml".into()],
        Vec::new(),
        Vec::new(),
    )
    .await
    .expect("flow");

    let paths: Vec<&str> = flow.spec().files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "app/Dockerfile",
            "app/docker-compose.yml",
            "app/static/css/site.css",
            "app/static/index.html",
            "app/web.env",
        ]
    );
    assert_eq!(flow.spec().compose_files, vec!["app/docker-compose.yml"]);
}

#[tokio::test]
async fn deploy_flow_names_missing_dependency() {
    let source = MemorySource::new(&[(
        "docker-compose.yml",
        "services:\n  web:\n    image: nginx\n    env_file: missing.env\n",
    )]);
    let err = ComposeDeployFlow::from_sources(
        &source,
        INSTANCE_ID,
        vec!["docker-compose.yml".into()],
        Vec::new(),
        Vec::new(),
    )
    .await
    .expect_err("missing env file");
    assert!(format!("{err:#}").contains("docker-compose.yml requires missing.env"));
}

#[tokio::test]
async fn deploy_flow_requires_a_compose_file() {
    let err = ComposeDeployFlow::from_sources(
        &MemorySource::default(),
        INSTANCE_ID,
        Vec::new(),
        Vec::new(),
        Vec::new(),
    )
    .await
    .expect_err("no compose files");
    assert!(err.to_string().contains("at least one compose file"));
}

fn paths(flow: &ComposeDeployFlow) -> Vec<&str> {
    flow.spec().files.iter().map(|f| f.path.as_str()).collect()
}

async fn deploy_from(source: &MemorySource) -> ComposeDeployFlow {
    ComposeDeployFlow::from_sources(
        source,
        INSTANCE_ID,
        vec!["docker-compose.yml".into()],
        Vec::new(),
        Vec::new(),
    )
    .await
    .expect("flow")
}

#[tokio::test]
async fn deploy_flow_finds_dockerfile_inside_build_context() {
    let source = MemorySource::new(&[
        (
            "docker-compose.yml",
            "services:\n  api:\n    build:\n      context: ./api\n",
        ),
        ("api/Dockerfile", "FROM python:3.12\n"),
        ("api/main.py", "print('hi')\n"),
    ]);
    let flow = deploy_from(&source).await;
    assert_eq!(
        paths(&flow),
        vec!["api/Dockerfile", "api/main.py", "docker-compose.yml"]
    );
}

#[tokio::test]
async fn deploy_flow_uploads_build_context_minus_dockerignore() {
    let source = MemorySource::new(&[
        ("docker-compose.yml", "services:\n  web:\n    build: ./web\n"),
        ("web/Dockerfile", "FROM python:3.12\nCOPY . /app\n"),
        ("web/.dockerignore", "**/*.pyc\n.venv\n"),
        ("web/app.py", "print('hi')\n"),
        ("web/pkg/util.py", ""),
        ("web/pkg/util.pyc", "bytecode"),
        ("web/.venv/bin/python", "binary"),
        ("README.md", "not in any context"),
    ]);
    let flow = deploy_from(&source).await;
    assert_eq!(
        paths(&flow),
        vec![
            "docker-compose.yml",
            "web/.dockerignore",
            "web/Dockerfile",
            "web/app.py",
            "web/pkg/util.py",
        ]
    );
}

#[tokio::test]
async fn deploy_flow_skips_remote_build_contexts() {
    let source = MemorySource::new(&[(
        "docker-compose.yml",
        "services:\n  site:\n    build: https://github.com/example/site.git\n",
    )]);
    let flow = deploy_from(&source).await;
    assert_eq!(paths(&flow), vec!["docker-compose.yml"]);
}

#[tokio::test]
async fn deploy_flow_names_missing_build_context() {
    let source = MemorySource::new(&[(
        "docker-compose.yml",
        "services:\n  api:\n    build:\n      context: ./api\n      dockerfile: /opt/Dockerfile.api\n",
    )]);
    let err = ComposeDeployFlow::from_sources(
        &source,
        INSTANCE_ID,
        vec!["docker-compose.yml".into()],
        Vec::new(),
        Vec::new(),
    )
    .await
    .expect_err("context directory is missing");
    assert!(format!("{err:#}").contains("docker-compose.yml builds from api"), "{err:#}");
}
