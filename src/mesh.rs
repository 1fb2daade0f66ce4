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

#[cfg(feature = "mesh")]
use std::collections::HashSet;
#[cfg(feature = "mesh")]
use std::sync::Mutex;

#[cfg(feature = "mesh")]
use tracing::{debug, info};

#[cfg(feature = "mesh")]
use crate::charm::CharmRef;
#[cfg(feature = "mesh")]
use crate::config::{CharmSpec, Config};
#[cfg(feature = "mesh")]
use crate::extensions::Extension;
use crate::model::Error;
#[cfg(feature = "mesh")]
use crate::model::{DeployOptions, Model, ModelFactory};
#[cfg(feature = "mesh")]
use crate::status;

#[cfg(feature = "mesh")]
const SERVICE_MESH_ENDPOINT: &str = "service-mesh";

/// MeshExtension runs tests under an Istio service mesh.
///
/// It deploys the mesh (a beacon in the primary model, the control plane in its own model),
/// deploys every charm with trust, and relates any charm exposing a `service-mesh` endpoint
/// to the beacon.
#[cfg(feature = "mesh")]
#[derive(Debug, Default)]
pub struct MeshExtension {
    config: Config,
    // Names of models with mesh infrastructure. Never shrinks.
    enabled: Mutex<HashSet<String>>,
}

#[cfg(feature = "mesh")]
impl MeshExtension {
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_config(Config::default()))
    }

    pub fn with_config(config: Config) -> Self {
        MeshExtension {
            config,
            enabled: Default::default(),
        }
    }

    pub fn is_mesh_enabled(&self, model: &dyn Model) -> bool {
        self.enabled.lock().unwrap().contains(model.name())
    }

    fn mark_enabled(&self, model: &dyn Model) {
        self.enabled.lock().unwrap().insert(model.name().to_string());
    }

    /// probe inspects the endpoint bindings of `app` for a `service-mesh` endpoint.
    pub fn probe(&self, model: &dyn Model, app: &str) -> EndpointProbe {
        let stdout = match model.cli(&["show-application", app, "--format", "json"]) {
            Ok(stdout) => stdout,
            Err(e) => return EndpointProbe::Failed(ProbeError::Command(e)),
        };
        match has_mesh_endpoint(&stdout, app) {
            Ok(true) => EndpointProbe::Found,
            Ok(false) => EndpointProbe::NotFound,
            Err(e) => EndpointProbe::Failed(e),
        }
    }

    fn integrate_to_beacon(&self, model: &dyn Model, app: &str) -> Result<(), Error> {
        let beacon = &self.config.beacon.app;
        info!(model = model.name(), app, beacon = %beacon, "integrating with mesh beacon");
        model.integrate(
            &format!("{app}:{SERVICE_MESH_ENDPOINT}"),
            &format!("{beacon}:{SERVICE_MESH_ENDPOINT}"),
        )
    }
}

#[cfg(feature = "mesh")]
fn deploy_spec(model: &dyn Model, spec: &CharmSpec, options: DeployOptions) -> Result<(), Error> {
    info!(
        model = model.name(),
        charm = %spec.charm,
        channel = %spec.channel,
        "deploying"
    );
    model.deploy(
        &CharmRef::from(spec.charm.as_str()),
        Some(&spec.app),
        &options.with_channel(&spec.channel),
    )
}

#[cfg(feature = "mesh")]
fn ready(s: &status::Status) -> bool {
    status::all_active(s) && status::all_agents_idle(s)
}

#[cfg(feature = "mesh")]
impl Extension for MeshExtension {
    fn name(&self) -> &'static str {
        "mesh"
    }

    fn help_text(&self) -> &'static str {
        "Add mesh components to the test and operate under meshed condition"
    }

    fn setup_infrastructure(&self, factory: &dyn ModelFactory) -> Result<(), Error> {
        let juju = factory.get_juju("")?;
        deploy_spec(
            juju.as_ref(),
            &self.config.beacon,
            DeployOptions::default().with_config("model-on-mesh", "true"),
        )?;

        let istio = factory.get_juju(&self.config.control_plane_model)?;
        deploy_spec(
            istio.as_ref(),
            &self.config.control_plane,
            DeployOptions::default(),
        )?;

        self.mark_enabled(juju.as_ref());

        juju.wait(&ready)?;
        istio.wait(&ready)?;
        info!(model = juju.name(), "mesh is ready");
        Ok(())
    }

    fn modify_deploy_args(&self, args: &DeployOptions) -> DeployOptions {
        DeployOptions {
            trust: true,
            ..args.clone()
        }
    }

    fn post_deploy_hook(
        &self,
        model: &dyn Model,
        app: Option<&str>,
        charm: &CharmRef,
    ) -> Result<(), Error> {
        let app = match app {
            Some(app) if !app.is_empty() => app.to_string(),
            _ => charm.charm_name(),
        };

        if !self.is_mesh_enabled(model) {
            return Ok(());
        }

        let probe = self.probe(model, &app);
        if probe.is_found() {
            return self.integrate_to_beacon(model, &app);
        }
        debug!(app = %app, ?probe, "no {SERVICE_MESH_ENDPOINT} endpoint, skipping integration");
        Ok(())
    }
}

/// Outcome of inspecting an application for the `service-mesh` endpoint.
#[cfg(feature = "mesh")]
#[derive(Debug)]
pub enum EndpointProbe {
    Found,
    NotFound,
    Failed(ProbeError),
}

#[cfg(feature = "mesh")]
impl EndpointProbe {
    /// Only a confident positive counts; failures are treated as absence.
    pub fn is_found(&self) -> bool {
        matches!(self, EndpointProbe::Found)
    }
}

#[cfg(feature = "mesh")]
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("show-application failed: {0}")]
    Command(Error),
    #[error("invalid show-application output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("application {0} missing from show-application output")]
    MissingApplication(String),
    #[error("application {0} has no endpoint-bindings")]
    MissingBindings(String),
}

#[cfg(feature = "mesh")]
fn has_mesh_endpoint(stdout: &str, app: &str) -> Result<bool, ProbeError> {
    let doc: serde_json::Value = serde_json::from_str(stdout)?;
    let info = doc
        .get(app)
        .ok_or_else(|| ProbeError::MissingApplication(app.to_string()))?;
    let bindings = info
        .get("endpoint-bindings")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| ProbeError::MissingBindings(app.to_string()))?;
    Ok(bindings.contains_key(SERVICE_MESH_ENDPOINT))
}

/// Stand-in used when the crate is built without the `mesh` feature.
#[cfg(not(feature = "mesh"))]
#[derive(Debug)]
pub struct MeshExtension(());

#[cfg(not(feature = "mesh"))]
impl MeshExtension {
    pub fn new() -> Result<Self, Error> {
        Err(Error::Unavailable(
            "Mesh extension requires additional dependencies. Enable with: features = [\"mesh\"]"
                .to_string(),
        ))
    }
}
