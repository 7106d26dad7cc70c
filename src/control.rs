use crate::error::{Error, Result};
use crate::poller::RefreshHandle;
use crate::source::{PAUSE_PATH, RESUME_PATH, endpoint};
use crate::status::ButtonState;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// Shared enablement of the pause/resume controls.
///
/// The poller overwrites it with the derived state after every applied
/// snapshot; the gateway only ever flips `pause_enabled` optimistically.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    tx: Arc<watch::Sender<ButtonState>>,
}

impl ControlPanel {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ButtonState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ButtonState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ButtonState> {
        self.tx.subscribe()
    }

    pub fn apply_derived(&self, buttons: ButtonState) {
        self.tx.send_replace(buttons);
    }

    pub fn set_pause_enabled(&self, enabled: bool) {
        self.tx.send_modify(|buttons| buttons.pause_enabled = enabled);
    }

    /// Disables pause if it is enabled. Returns whether this call did it, so
    /// at most one of several racing callers wins.
    pub fn take_pause(&self) -> bool {
        self.tx.send_if_modified(|buttons| {
            let was_enabled = buttons.pause_enabled;
            buttons.pause_enabled = false;
            was_enabled
        })
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Pause,
    Resume,
    Refresh,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Refresh => "refresh",
        })
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Ok(Action::Pause),
            "r" | "resume" => Ok(Action::Resume),
            "f" | "refresh" => Ok(Action::Refresh),
            other => Err(Error::Config(format!("Unknown action: {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub action: Action,
    pub status: StatusCode,
}

/// Sends pause/resume commands to the backend.
pub struct ControlGateway {
    client: Client,
    pause_url: Url,
    resume_url: Url,
    panel: ControlPanel,
    refresh: RefreshHandle,
}

impl ControlGateway {
    pub fn new(client: Client, base: &Url, panel: ControlPanel, refresh: RefreshHandle) -> Result<Self> {
        Ok(Self {
            client,
            pause_url: endpoint(base, PAUSE_PATH)?,
            resume_url: endpoint(base, RESUME_PATH)?,
            panel,
            refresh,
        })
    }

    /// Disables pause before the request goes out and re-enables it if the
    /// backend does not confirm. On success a refresh is requested and the
    /// control stays disabled until a snapshot says otherwise.
    pub async fn pause(&self) -> Result<CommandOutcome> {
        self.panel.set_pause_enabled(false);
        self.send_pause().await
    }

    /// Like [`pause`](Self::pause), but only when the control is enabled.
    /// `Ok(None)` means another caller got there first or pause is not
    /// available.
    pub async fn pause_if_enabled(&self) -> Result<Option<CommandOutcome>> {
        if !self.panel.take_pause() {
            return Ok(None);
        }
        self.send_pause().await.map(Some)
    }

    async fn send_pause(&self) -> Result<CommandOutcome> {
        log::info!("Requesting pause");

        let status = match self.client.post(self.pause_url.clone()).send().await {
            Ok(res) => res.status(),
            Err(e) => {
                self.panel.set_pause_enabled(true);
                log::error!("Pause request failed: {}", e);
                return Err(e.into());
            }
        };

        if !status.is_success() {
            self.panel.set_pause_enabled(true);
            log::error!("Pause rejected with status {}", status);
            return Err(Error::CommandFailure {
                action: Action::Pause.to_string(),
                status,
            });
        }

        self.refresh.request();
        Ok(CommandOutcome {
            action: Action::Pause,
            status,
        })
    }

    /// Sends resume and requests a refresh however the request ended. The
    /// response status is reported but never treated as a failure.
    pub async fn resume(&self) -> Result<CommandOutcome> {
        log::info!("Requesting resume");

        let result = self.client.post(self.resume_url.clone()).send().await;
        self.refresh.request();

        let status = result?.status();
        log::debug!("Resume answered with {}", status);
        Ok(CommandOutcome {
            action: Action::Resume,
            status,
        })
    }
}

/// What a handler gets to work with.
#[derive(Clone)]
pub struct CommandContext {
    pub gateway: Arc<ControlGateway>,
    pub panel: ControlPanel,
    pub refresh: RefreshHandle,
}

pub type Handler = fn(CommandContext) -> BoxFuture<'static, Result<()>>;

/// Maps operator actions to their handlers.
#[derive(Clone)]
pub struct ActionTable {
    handlers: HashMap<Action, Handler>,
}

impl ActionTable {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, action: Action, handler: Handler) -> &mut Self {
        self.handlers.insert(action, handler);
        self
    }

    pub async fn dispatch(&self, action: Action, ctx: CommandContext) -> Result<()> {
        let handler = self
            .handlers
            .get(&action)
            .ok_or_else(|| Error::Internal(format!("No handler registered for {}", action)))?;
        log::info!("Operator action: {}", action);
        handler(ctx).await
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table
            .register(Action::Pause, handle_pause)
            .register(Action::Resume, handle_resume)
            .register(Action::Refresh, handle_refresh);
        table
    }
}

fn handle_pause(ctx: CommandContext) -> BoxFuture<'static, Result<()>> {
    async move {
        if ctx.gateway.pause_if_enabled().await?.is_none() {
            log::warn!("Pause is not available in the current state");
        }
        Ok(())
    }
    .boxed()
}

fn handle_resume(ctx: CommandContext) -> BoxFuture<'static, Result<()>> {
    async move {
        if !ctx.panel.current().resume_enabled {
            log::warn!("Resume is not available in the current state");
            return Ok(());
        }
        ctx.gateway.resume().await.map(|_| ())
    }
    .boxed()
}

fn handle_refresh(ctx: CommandContext) -> BoxFuture<'static, Result<()>> {
    async move {
        ctx.refresh.request();
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions() {
        assert_eq!("pause".parse::<Action>().unwrap(), Action::Pause);
        assert_eq!(" R \n".parse::<Action>().unwrap(), Action::Resume);
        assert_eq!("f".parse::<Action>().unwrap(), Action::Refresh);
        assert!("stop".parse::<Action>().is_err());
    }

    #[test]
    fn optimistic_disable_only_touches_pause() {
        let panel = ControlPanel::new();
        panel.apply_derived(ButtonState {
            pause_enabled: true,
            resume_enabled: true,
        });
        panel.set_pause_enabled(false);
        assert_eq!(
            panel.current(),
            ButtonState {
                pause_enabled: false,
                resume_enabled: true,
            }
        );
    }

    #[test]
    fn only_one_caller_takes_pause() {
        let panel = ControlPanel::new();
        panel.apply_derived(ButtonState {
            pause_enabled: true,
            resume_enabled: false,
        });
        assert!(panel.take_pause());
        assert!(!panel.take_pause());
        assert!(!panel.current().pause_enabled);
    }

    #[tokio::test]
    async fn missing_handler_is_an_error() {
        let (refresh, _requests) = crate::poller::refresh_channel();
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let panel = ControlPanel::new();
        let gateway = ControlGateway::new(Client::new(), &base, panel.clone(), refresh.clone()).unwrap();
        let ctx = CommandContext {
            gateway: Arc::new(gateway),
            panel,
            refresh,
        };

        let table = ActionTable::empty();
        assert!(table.dispatch(Action::Refresh, ctx).await.is_err());
    }

    #[tokio::test]
    async fn refresh_action_queues_a_cycle() {
        let (refresh, mut requests) = crate::poller::refresh_channel();
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let panel = ControlPanel::new();
        let gateway = ControlGateway::new(Client::new(), &base, panel.clone(), refresh.clone()).unwrap();
        let ctx = CommandContext {
            gateway: Arc::new(gateway),
            panel,
            refresh,
        };

        ActionTable::default().dispatch(Action::Refresh, ctx).await.unwrap();
        assert!(requests.try_take());
    }
}
