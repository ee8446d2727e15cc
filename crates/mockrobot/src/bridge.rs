//! String-returning facade for hosts that expect the classic driver contract:
//! every call returns an empty string on success and a human-readable
//! description otherwise.

use std::sync::Arc;

use mockrobot_common::Result;
use tracing::error;

use crate::{DriverState, MockRobotDriver, managers::Transport};

/// Wraps a shared [`MockRobotDriver`] behind the empty-string-on-success
/// calling convention.
///
/// Clones share the driver, so one clone can `abort` while another is
/// blocked in `execute_operation`.
pub struct DriverBridge<T: Transport> {
    driver: Arc<MockRobotDriver<T>>,
}

impl<T: Transport> Clone for DriverBridge<T> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
        }
    }
}

impl<T: Transport> DriverBridge<T> {
    /// Bridges an existing driver.
    pub fn new(driver: Arc<MockRobotDriver<T>>) -> Self {
        Self { driver }
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &Arc<MockRobotDriver<T>> {
        &self.driver
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    /// See [`MockRobotDriver::open_connection`].
    pub async fn open_connection(&self, address: &str) -> String {
        describe("OpenConnection", self.driver.open_connection(address).await)
    }

    /// See [`MockRobotDriver::initialize`].
    pub async fn initialize(&self) -> String {
        describe("Initialize", self.driver.initialize().await)
    }

    /// See [`MockRobotDriver::execute_operation`].
    pub async fn execute_operation(&self, operation: &str, names: &[String], values: &[String]) -> String {
        describe(
            "ExecuteOperation",
            self.driver.execute_operation(operation, names, values).await,
        )
    }

    /// See [`MockRobotDriver::abort`].
    pub async fn abort(&self) -> String {
        describe("Abort", self.driver.abort().await)
    }
}

fn describe(call: &str, outcome: Result<()>) -> String {
    match outcome {
        Ok(()) => String::new(),
        Err(err) => {
            error!("{} failed: {}", call, err);
            err.to_string()
        }
    }
}
