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

use std::sync::Arc;

use tracing::{debug, info};

use crate::charm::CharmRef;
use crate::model::{DeployOptions, Error, Model, ModelFactory};

/// This allows extending a test deployment workflow with custom logic. For example, deploying
/// extra infrastructure or wiring new applications into it.
pub trait Extension: Send + Sync {
    /// The name of the extension. Used to look the extension up.
    fn name(&self) -> &'static str;
    /// A human readable description, shown in help output.
    fn help_text(&self) -> &'static str;
    /// Called once per test session to provision whatever the extension relies on.
    fn setup_infrastructure(&self, _: &dyn ModelFactory) -> Result<(), Error> {
        Ok(())
    }
    /// Called before every charm deployment. Returns the options to deploy with.
    fn modify_deploy_args(&self, args: &DeployOptions) -> DeployOptions {
        args.clone()
    }
    /// Called after every charm deployment.
    fn post_deploy_hook(&self, _: &dyn Model, _: Option<&str>, _: &CharmRef) -> Result<(), Error> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name())
            .finish()
    }
}

impl serde::Serialize for dyn Extension {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

/// ExtensionManager drives the registered extensions around deployments.
#[derive(serde::Serialize, Clone, Debug, Default)]
pub struct ExtensionManager {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ExtensionManager {
    pub fn new(extensions: Vec<Box<dyn Extension>>) -> Self {
        ExtensionManager {
            extensions: extensions.into_iter().map(Arc::from).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.iter().find(|e| e.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Renders one `name: help` line per extension.
    pub fn help(&self) -> String {
        self.extensions
            .iter()
            .map(|e| format!("{}: {}", e.name(), e.help_text()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn setup_infrastructure(&self, factory: &dyn ModelFactory) -> Result<(), Error> {
        for ext in &self.extensions {
            info!(extension = ext.name(), "setting up infrastructure");
            ext.setup_infrastructure(factory)?;
        }
        Ok(())
    }

    /// Deploy a charm, letting each extension adjust the options beforehand and react afterwards.
    pub fn deploy(
        &self,
        model: &dyn Model,
        charm: &CharmRef,
        app: Option<&str>,
        options: &DeployOptions,
    ) -> Result<(), Error> {
        let options = self
            .extensions
            .iter()
            .fold(options.clone(), |opts, ext| ext.modify_deploy_args(&opts));
        debug!(model = model.name(), %charm, ?options, "deploying");
        model.deploy(charm, app, &options)?;
        for ext in &self.extensions {
            ext.post_deploy_hook(model, app, charm)?;
        }
        Ok(())
    }
}
