//! Scripted transport and fixtures shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use crate::models::error::TransportError;
use crate::traits::transport::{commands, CommandResponse, ManagementTransport};

type Hook = Arc<dyn Fn() + Send + Sync>;

/// In-memory transport answering from a command → response table.
///
/// Unscripted commands answer `{"Response": "Success"}`.
pub(crate) struct ScriptedTransport {
    connected: AtomicBool,
    responses: Mutex<HashMap<String, CommandResponse>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    hooks: Mutex<HashMap<String, Hook>>,
    issued: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashSet::new()),
            hooks: Mutex::new(HashMap::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn set_response(&self, command: &str, response: CommandResponse) {
        self.responses.lock().insert(command.to_string(), response);
    }

    pub(crate) fn fail(&self, command: &str) {
        self.failing.lock().insert(command.to_string());
    }

    /// Answer `command` with [`TransportError::Timeout`].
    pub(crate) fn stall(&self, command: &str) {
        self.stalled.lock().insert(command.to_string());
    }

    /// Run `hook` whenever `command` is issued, before answering it.
    pub(crate) fn on_command(&self, command: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().insert(command.to_string(), Arc::new(hook));
    }

    /// Script a listing with the given entries, each its own call `call-N`.
    pub(crate) fn script_history(&self, numbers: impl IntoIterator<Item = u32> + Clone) {
        self.set_response(commands::SHOW_HISTORY, json!(history_listing(numbers.clone())));
        for n in numbers {
            self.set_response(&commands::show_entry(n), json!(entry_body(n, &format!("call-{}", n))));
        }
    }

    /// Every command issued so far, in order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

impl ManagementTransport for ScriptedTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_command(&self, command: &str, _timeout: Duration) -> Result<CommandResponse, TransportError> {
        self.issued.lock().push(command.to_string());

        let hook = self.hooks.lock().get(command).cloned();
        if let Some(hook) = hook {
            hook();
        }

        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if self.stalled.lock().contains(command) {
            return Err(TransportError::Timeout);
        }
        if self.failing.lock().contains(command) {
            return Err(TransportError::CommandFailed(format!("scripted failure: {}", command)));
        }
        Ok(self
            .responses
            .lock()
            .get(command)
            .cloned()
            .unwrap_or_else(|| json!({"Response": "Success"})))
    }
}

/// `pjsip show history` output listing the given entry numbers.
pub(crate) fn history_listing(numbers: impl IntoIterator<Item = u32>) -> String {
    let mut lines = vec![
        "No.   Timestamp  Direction Address               SIP Message".to_string(),
        "===== ========== ========= ===================== ====================".to_string(),
    ];
    for n in numbers {
        lines.push(format!(
            "{:05} {} * <== 10.0.0.5:5060          INVITE sip:100@pbx SIP/2.0",
            n,
            1_700_000_000 + i64::from(n)
        ));
    }
    lines.join("\n")
}

/// Detail output for entry `n`: an INVITE for `call_id`, timestamped now.
pub(crate) fn entry_body(n: u32, call_id: &str) -> String {
    format!(
        "<--- History Entry {} Received from 10.0.0.5:5060 at {} --->\n\
         INVITE sip:100@pbx SIP/2.0\n\
         Via: SIP/2.0/UDP 10.0.0.5:5060;branch=z9hG4bK{}\n\
         From: <sip:200@pbx>;tag={}\n\
         To: <sip:100@pbx>\n\
         Call-ID: {}\n\
         CSeq: 1 INVITE\n\
         Content-Length: 0",
        n,
        chrono::Utc::now().timestamp(),
        n,
        n,
        call_id
    )
}
