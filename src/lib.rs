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

//! Service mesh support for Juju integration tests.
//!
//! [`mesh::MeshExtension`] deploys Istio into the models of a test run, deploys every charm
//! with trust, and relates charms that expose a `service-mesh` endpoint to the mesh beacon.

pub mod charm;
pub mod config;
pub mod extensions;
pub mod mesh;
pub mod model;
pub mod status;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod test_helpers;
