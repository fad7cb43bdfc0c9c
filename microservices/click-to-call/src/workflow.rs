//! Call origination workflow
//!
//! One request runs: validate → allow-list → connect + login → technology
//! lookup → Originate → logoff. Each step either hands its output to the
//! next one or ends the run with a failed [`CallResult`]. Connect, login
//! and lookup are idempotent and may be retried on a fresh connection;
//! Originate is sent at most once.

use pbx_ami::{Action, AmiSession, ProtocolResponse};
use tracing::{info, info_span, warn, Instrument};

use crate::allowlist::AllowList;
use crate::call::{CallRequest, CallResult, RequestValidator};
use crate::config::{AmiConfig, Config, DialPlan};
use crate::error::{CallError, Result};
use crate::retry::RetryPolicy;

/// AstDB family holding per-device settings
const DEVICE_FAMILY: &str = "DEVICE";

/// Places calls through the PBX manager interface
pub struct CallWorkflow {
    ami: AmiConfig,
    dial: DialPlan,
    allow_list: AllowList,
    retry: RetryPolicy,
    validator: RequestValidator,
}

impl CallWorkflow {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            config.ami.clone(),
            config.dial.clone(),
            AllowList::parse(&config.allowed_ips),
            RetryPolicy::from_max_retry(config.max_retry, config.retry_interval),
        )
    }

    pub fn from_parts(ami: AmiConfig, dial: DialPlan, allow_list: AllowList, retry: RetryPolicy) -> Self {
        Self {
            ami,
            dial,
            allow_list,
            retry,
            validator: RequestValidator::new(),
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Run one call request end to end. Never fails: every problem is
    /// reported through the returned result.
    pub async fn originate(&self, request: &CallRequest, client_addr: &str) -> CallResult {
        let span = info_span!(
            "originate",
            extension = %request.extension,
            number = %request.number,
            client = %client_addr
        );

        async move {
            let result = self.run(request, client_addr).await;
            if result.success() {
                info!(technology = result.technology(), "Call queued at PBX");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &CallRequest, client_addr: &str) -> CallResult {
        if let Err(err) = self.validator.validate(request) {
            return reject(err, "", "");
        }

        if !self.allow_list.permits(client_addr) {
            return reject(CallError::Unauthorized(client_addr.to_string()), "", "");
        }

        let prepared = self
            .retry
            .run("connect+lookup", CallError::is_transient, |_| self.prepare(request))
            .await;
        let (mut session, technology) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return reject(err, "", ""),
        };

        let placed = self.place(&mut session, request, &technology).await;
        session.close().await;

        match placed {
            Ok(response) if response.is_success() => {
                CallResult::placed(request, &technology, response.raw())
            }
            Ok(response) => {
                let reason = response
                    .message()
                    .or_else(|| response.status())
                    .unwrap_or("no status in reply")
                    .to_string();
                reject(CallError::Originate(reason), &technology, response.raw())
            }
            Err(err) => reject(err, &technology, ""),
        }
    }

    /// Connect, authenticate and resolve the extension's technology.
    ///
    /// On failure the session is closed before returning, so a retry
    /// always starts from a fresh connection.
    async fn prepare(&self, request: &CallRequest) -> Result<(AmiSession, String)> {
        let mut session = AmiSession::open(&self.ami.host, self.ami.port, self.ami.session_options()).await?;

        if let Err(e) = session.login(&self.ami.username, &self.ami.secret).await {
            session.close().await;
            return Err(e.into());
        }

        match lookup_technology(&mut session, &request.extension).await {
            Ok(technology) => Ok((session, technology)),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    async fn place(
        &self,
        session: &mut AmiSession,
        request: &CallRequest,
        technology: &str,
    ) -> Result<ProtocolResponse> {
        let action = originate_action(&self.dial, technology, request);
        let response = session.send_action(&action).await?;
        Ok(response)
    }
}

async fn lookup_technology(session: &mut AmiSession, extension: &str) -> Result<String> {
    let key = format!("{}/tech", extension);
    let value = session.db_get(DEVICE_FAMILY, &key).await?;

    value
        .as_deref()
        .and_then(technology_token)
        .ok_or_else(|| CallError::Lookup(extension.to_string()))
}

/// Leading word characters of a DBGet value, upper-cased (`pjsip` → `PJSIP`)
fn technology_token(value: &str) -> Option<String> {
    let token: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if token.is_empty() {
        None
    } else {
        Some(token.to_ascii_uppercase())
    }
}

/// `Originate` with `Async: yes` so the PBX replies as soon as the call
/// is queued instead of when it completes
pub fn originate_action(dial: &DialPlan, technology: &str, request: &CallRequest) -> Action {
    Action::new("Originate")
        .field("Channel", format!("{}/{}", technology, request.extension))
        .field("WaitTime", dial.wait_time.to_string())
        .field("CallerId", dial.caller_id(&request.number))
        .field("Exten", request.number.as_str())
        .field("Context", dial.context.as_str())
        .field("Priority", dial.priority.to_string())
        .field("Async", "yes")
}

fn reject(err: CallError, technology: &str, originate_response: &str) -> CallResult {
    warn!(error_code = err.error_code(), error = %err, "Call request failed");
    CallResult::failed(&err, technology, originate_response)
}
