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

use std::env;

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry, filter, filter::EnvFilter, prelude::*};

const LOG_FORMAT: &str = "LOG_FORMAT";
const DEFAULT_FILTER: &str = "info";

/// setup_logging installs the global subscriber. Output is compact text unless `LOG_FORMAT=json`;
/// the filter is read from `RUST_LOG`.
pub fn setup_logging() {
    if let Err(e) = try_setup_logging() {
        eprintln!("failed to setup logging: {e}");
    }
}

pub fn try_setup_logging() -> Result<(), Error> {
    let filter = env_filter(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?;
    let json = env::var(LOG_FORMAT).is_ok_and(|f| f == "json");
    tracing_subscriber::registry()
        .with(fmt_layer::<Registry, _>(json, std::io::stderr).with_filter(filter))
        .try_init()
        .map_err(|e| Error::Init(e.to_string()))
}

fn fmt_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);
    if json {
        Box::new(layer.json().flatten_event(true))
    } else {
        Box::new(layer.compact())
    }
}

fn env_filter(directives: Option<&str>) -> Result<EnvFilter, Error> {
    Ok(EnvFilter::builder()
        .with_regex(false)
        .parse(directives.unwrap_or(DEFAULT_FILTER))?)
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("parse failure: {0}")]
    InvalidFilter(#[from] filter::ParseError),
    #[error("logging is already initialized: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::info;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(json: bool) -> String {
        let buf = Buffer::default();
        let subscriber = tracing_subscriber::registry().with(fmt_layer(json, buf.clone()));
        tracing::subscriber::with_default(subscriber, || {
            info!(model = "test-run", app = "istio-k8s", "deploying");
        });
        buf.contents()
    }

    #[test]
    fn plain_lines() {
        let out = capture(false);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains(" INFO "), "{out}");
        assert!(out.contains("deploying"), "{out}");
        assert!(out.contains(r#"model="test-run""#), "{out}");
        assert!(out.contains(r#"app="istio-k8s""#), "{out}");
    }

    #[test]
    fn json_lines() {
        let out = capture(true);
        let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["message"], "deploying");
        assert_eq!(line["model"], "test-run");
        assert_eq!(line["app"], "istio-k8s");
    }

    #[test]
    fn filter_directives() {
        assert_eq!(env_filter(None).unwrap().to_string(), "info");
        assert_eq!(
            env_filter(Some("juju_mesh=debug")).unwrap().to_string(),
            "juju_mesh=debug"
        );
        assert!(matches!(
            env_filter(Some("juju_mesh=loud")),
            Err(Error::InvalidFilter(_))
        ));
    }
}
