use std::sync::Arc;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::sip_message::{CallSummary, SipMessage};
use crate::models::state::{CaptureDiagnostics, CaptureStatus};
use crate::session::controller::CaptureController;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::transport::ManagementTransport;

/// Read and lifecycle surface for the admin API's SIP debug routes.
///
/// One instance is created at startup and handed to the HTTP layer; every
/// read runs the age cleanup first.
pub struct SipDebugFacade {
    controller: CaptureController,
}

impl SipDebugFacade {
    pub fn new(
        transport: Arc<dyn ManagementTransport>,
        config: CaptureConfiguration,
    ) -> Result<Self, CaptureError> {
        Ok(Self {
            controller: CaptureController::new(transport, config)?,
        })
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn CaptureDelegate>) -> Self {
        self.controller.set_delegate(delegate);
        self
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    /// `GET /status`
    pub fn status(&self) -> CaptureStatus {
        self.controller.status()
    }

    /// `POST /enable`. [`CaptureError::TransportUnavailable`] maps to 503.
    pub fn enable_capture(&self) -> Result<(), CaptureError> {
        self.controller.enable()
    }

    /// `POST /disable`. Always succeeds locally.
    pub fn disable_capture(&self) {
        self.controller.disable();
    }

    /// `GET /calls`
    pub fn list_calls(&self) -> Vec<CallSummary> {
        self.controller.calls()
    }

    /// `GET /calls/{call_id}`. Unknown or fully evicted calls are
    /// [`CaptureError::CallNotFound`].
    pub fn call_messages(&self, call_id: &str) -> Result<Vec<SipMessage>, CaptureError> {
        let messages = self.controller.call_messages(call_id);
        if messages.is_empty() {
            return Err(CaptureError::CallNotFound(call_id.to_string()));
        }
        Ok(messages)
    }

    pub fn clear(&self) {
        self.controller.clear();
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.controller.diagnostics()
    }
}
