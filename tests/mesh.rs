// Copyright Istio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use juju_mesh::charm::CharmRef;
use juju_mesh::extensions::ExtensionManager;
use juju_mesh::mesh::MeshExtension;
use juju_mesh::model::DeployOptions;
use juju_mesh::test_helpers::{Call, MockFactory, initialize_telemetry};

const MESHED: &str = r#"{"my-app": {"endpoint-bindings": {"": "alpha", "service-mesh": "alpha"}}}"#;
const PLAIN: &str = r#"{"other-app": {"endpoint-bindings": {"": "alpha"}}}"#;

fn manager() -> anyhow::Result<ExtensionManager> {
    Ok(ExtensionManager::new(vec![Box::new(MeshExtension::new()?)]))
}

#[test]
fn meshed_test_run() -> anyhow::Result<()> {
    initialize_telemetry();
    let mgr = manager()?;
    assert_eq!(
        mgr.help(),
        "mesh: Add mesh components to the test and operate under meshed condition"
    );

    let factory = MockFactory::new("test-run");
    mgr.setup_infrastructure(&factory)?;

    let model = factory.model("");
    model.respond("show-application", Ok(MESHED));
    let charm = CharmRef::from(PathBuf::from("./my-app_ubuntu@22.04-amd64.charm"));
    mgr.deploy(&*model, &charm, None, &DeployOptions::default())?;

    let calls = model.calls();
    // beacon deploy, wait, app deploy, probe, integrate
    assert_eq!(calls.len(), 5);
    assert_eq!(
        calls[2],
        Call::Deploy {
            charm: "./my-app_ubuntu@22.04-amd64.charm".to_string(),
            app: None,
            options: DeployOptions {
                trust: true,
                ..Default::default()
            },
        }
    );
    assert_eq!(
        calls[4],
        Call::Integrate(
            "my-app:service-mesh".to_string(),
            "istio-beacon-k8s:service-mesh".to_string()
        )
    );
    Ok(())
}

#[test]
fn apps_without_mesh_endpoint_are_left_alone() -> anyhow::Result<()> {
    initialize_telemetry();
    let mgr = manager()?;
    let factory = MockFactory::new("test-run");
    mgr.setup_infrastructure(&factory)?;

    let model = factory.model("");
    model.respond("show-application", Ok(PLAIN));
    mgr.deploy(
        &*model,
        &CharmRef::from("other-app"),
        Some("other-app"),
        &DeployOptions::default().with_channel("latest/stable"),
    )?;
    assert!(
        !model
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Integrate(..)))
    );
    Ok(())
}

#[test]
fn unmeshed_model_only_gets_trust() -> anyhow::Result<()> {
    initialize_telemetry();
    let mgr = manager()?;
    // No setup_infrastructure: nothing is meshed.
    let factory = MockFactory::new("test-run");
    let model = factory.model("");
    model.respond("show-application", Ok(MESHED));
    mgr.deploy(&*model, &CharmRef::from("my-app"), None, &DeployOptions::default())?;
    assert_eq!(
        model.calls(),
        vec![Call::Deploy {
            charm: "my-app".to_string(),
            app: None,
            options: DeployOptions {
                trust: true,
                ..Default::default()
            },
        }]
    );
    Ok(())
}
