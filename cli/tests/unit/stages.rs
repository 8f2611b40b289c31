//! Stage lifecycle contract and per-phase behavior against mocks.

#![allow(clippy::expect_used)]

use ephemera_cli::application::StageStatus;
use ephemera_cli::application::stage::{
    CompleteSetup, CreateInstance, DeployCompose, DeploySpec, InstallSoftware, Stage,
};
use ephemera_cli::domain::StageError;
use ephemera_cli::domain::instance::{InstanceDockerFile, InstanceStatus, OperationStatus};

use crate::mocks::{
    Harness, INSTANCE_ID, INSTANCE_NAME, MockCloud, PUBLIC_IP, ScriptedConnector, failed,
    fresh_record, ok, running_record,
};

#[tokio::test]
async fn initialize_twice_is_a_contract_violation() {
    let harness = Harness::new(MockCloud::default(), fresh_record(), ScriptedConnector::succeeding());
    let ctx = harness.context();
    let mut stage = Stage::from(CreateInstance::new(INSTANCE_ID, "plan-small"));
    stage.initialize(&ctx).await.expect("first initialize");
    let err = stage.initialize(&ctx).await.expect_err("second initialize");
    assert!(matches!(err, StageError::Contract(ref m) if m.contains("initialized more than once")));
    assert_eq!(harness.cloud.requests.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn update_before_initialize_is_a_contract_violation() {
    let harness = Harness::new(MockCloud::default(), fresh_record(), ScriptedConnector::succeeding());
    let mut stage = Stage::from(CompleteSetup::new(INSTANCE_ID));
    let err = stage.update(&harness.context()).await.expect_err("not initialized");
    assert!(matches!(err, StageError::Contract(ref m) if m.contains("updated before initialize")));
}

#[tokio::test]
async fn create_instance_waits_for_operations_then_opens_ssh() {
    let harness = Harness::new(
        MockCloud::with_polls([OperationStatus::Started]),
        fresh_record(),
        ScriptedConnector::succeeding(),
    );
    let ctx = harness.context();
    let mut stage = Stage::from(CreateInstance::new(INSTANCE_ID, "plan-small"));
    stage.initialize(&ctx).await.expect("initialize");

    let first = stage.update(&ctx).await.expect("first poll");
    assert_eq!(
        first,
        StageStatus::InProgress("Waiting for cloud operations (0/1 complete)".to_string())
    );
    assert_eq!(stage.update(&ctx).await.expect("second poll"), StageStatus::Succeeded);

    let provisioned = stage.provisioned().expect("outcome");
    assert_eq!(provisioned.public_ip, PUBLIC_IP);
    assert_eq!(provisioned.name, INSTANCE_NAME);
    let opened = harness.cloud.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].1[0].to_string(), "22/tcp");
    let saved = harness.store.get(INSTANCE_ID).expect("record");
    assert_eq!(saved.public_ip.as_deref(), Some(PUBLIC_IP));
    assert_eq!(harness.notifier.names(), vec!["provisioning_started"]);

    // Succeeded is sticky and does not poll the cloud again.
    assert_eq!(stage.update(&ctx).await.expect("idempotent"), StageStatus::Succeeded);
}

#[tokio::test]
async fn create_instance_fails_on_failed_operation() {
    let harness = Harness::new(
        MockCloud::with_polls([OperationStatus::Failed {
            reason: "quota exceeded".into(),
        }]),
        fresh_record(),
        ScriptedConnector::succeeding(),
    );
    let ctx = harness.context();
    let mut stage = Stage::from(CreateInstance::new(INSTANCE_ID, "plan-small"));
    stage.initialize(&ctx).await.expect("initialize");
    let err = stage.update(&ctx).await.expect_err("operation failed");
    assert!(err.to_string().contains("quota exceeded"));

    let after = stage.update(&ctx).await.expect_err("failed stage");
    assert!(matches!(after, StageError::Contract(_)));
}

#[tokio::test]
async fn create_instance_reports_missing_record() {
    let harness = Harness::new(MockCloud::default(), fresh_record(), ScriptedConnector::succeeding());
    let mut stage = Stage::from(CreateInstance::new("inst-unknown", "plan-small"));
    let err = stage.initialize(&harness.context()).await.expect_err("missing");
    assert!(err.to_string().contains("inst-unknown not found"));
}

#[tokio::test]
async fn install_software_runs_one_command_per_update() {
    let ssh = ScriptedConnector::succeeding();
    let harness = Harness::new(MockCloud::default(), running_record(), ssh.clone());
    let ctx = harness.context();
    let mut stage = Stage::from(InstallSoftware::new(INSTANCE_ID, PUBLIC_IP));
    stage.initialize(&ctx).await.expect("initialize");

    let mut polls = 0;
    while stage.update(&ctx).await.expect("update") != StageStatus::Succeeded {
        polls += 1;
        assert_eq!(ssh.commands().len(), polls);
    }
    assert_eq!(ssh.commands().len(), 5);
    assert!(ssh.commands()[0].contains("get.docker.com"));

    stage.dispose().await;
    assert_eq!(ssh.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn complete_setup_marks_record_ready() {
    let harness = Harness::new(MockCloud::default(), running_record(), ScriptedConnector::succeeding());
    let ctx = harness.context();
    let mut stage = Stage::from(CompleteSetup::new(INSTANCE_ID));
    stage.initialize(&ctx).await.expect("initialize");
    assert_eq!(stage.update(&ctx).await.expect("update"), StageStatus::Succeeded);

    let saved = harness.store.get(INSTANCE_ID).expect("record");
    assert_eq!(saved.status, InstanceStatus::Ready);
    assert_eq!(harness.notifier.names(), vec!["provisioning_completed"]);
}

#[tokio::test]
async fn complete_setup_requires_public_ip() {
    let harness = Harness::new(MockCloud::default(), fresh_record(), ScriptedConnector::succeeding());
    let mut stage = Stage::from(CompleteSetup::new(INSTANCE_ID));
    let err = stage.initialize(&harness.context()).await.expect_err("no ip");
    assert!(err.to_string().contains("has no public IP address"));
    assert_eq!(harness.ssh.connects.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deploy_rejects_unsafe_paths_before_connecting() {
    let ssh = ScriptedConnector::succeeding();
    let harness = Harness::new(MockCloud::default(), running_record(), ssh.clone());
    let spec = DeploySpec {
        compose_files: vec!["docker-compose.yml".into()],
        files: vec![InstanceDockerFile::new("../escape.env", "A=1")],
        ..DeploySpec::default()
    };
    let mut stage = Stage::from(DeployCompose::new(INSTANCE_ID, spec, "/srv/app"));
    let err = stage.initialize(&harness.context()).await.expect_err("unsafe");
    assert!(err.to_string().contains("../escape.env"));
    assert_eq!(ssh.connects.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deploy_build_failure_carries_compose_output() {
    let ssh = ScriptedConnector::new(|cmd| {
        if cmd.contains(" build ") {
            failed(17, "failed to solve: base image not found")
        } else {
            ok("")
        }
    });
    let harness = Harness::new(MockCloud::default(), running_record(), ssh.clone());
    let ctx = harness.context();
    let spec = DeploySpec {
        compose_files: vec!["docker-compose.yml".into()],
        files: vec![InstanceDockerFile::new("docker-compose.yml", "services: {}\n")],
        ..DeploySpec::default()
    };
    let mut stage = Stage::from(DeployCompose::new(INSTANCE_ID, spec, "/srv/app"));
    stage.initialize(&ctx).await.expect("initialize");

    let err = loop {
        match stage.update(&ctx).await {
            Ok(StageStatus::InProgress(_)) => {}
            Ok(StageStatus::Succeeded) => panic!("build should fail"),
            Err(err) => break err,
        }
    };
    assert_eq!(err.to_string(), "DeployCompose: docker compose build failed");
    assert_eq!(
        err.client_payload(),
        Some("failed to solve: base image not found")
    );
    assert!(ssh.ran("ls -la"));
    assert_eq!(harness.notifier.names(), vec!["deployment_failed"]);
}
