//! Supervision of running blocks.
//!
//! The supervisor owns the set of running activities: one monitor task per
//! block, which spawns the serving task and watches its join handle. A
//! panicking kernel gets its block restarted with fresh cycle state
//! (routing and the internal map survive); restart frequency is bounded,
//! and a chronically failing block is marked failed and reported.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::block::Block;
use crate::error::SupervisorError;

/// Handle to a supervised block, returned by [`Supervisor::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(Uuid);

impl Token {
    fn new() -> Self {
        Token(Uuid::new_v4())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a supervised activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityState {
    /// Registered but not yet scheduled.
    Created,
    /// The serving task is running.
    Running,
    /// The activity terminated cleanly on a stop interrupt.
    Stopped,
    /// The activity exhausted its restart budget.
    Failed,
}

/// Restart policy for supervised blocks.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Panics tolerated within `restart_window` before a block is marked
    /// failed.
    pub max_restarts: usize,
    /// Sliding window over which restarts are counted.
    pub restart_window: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            max_restarts: 5,
            restart_window: Duration::from_secs(30),
        }
    }
}

struct Supervised {
    block: Block,
    monitor: JoinHandle<()>,
    state: Arc<Mutex<ActivityState>>,
}

/// Launches and watches one activity per block.
pub struct Supervisor {
    config: SupervisorConfig,
    blocks: Mutex<BTreeMap<Token, Supervised>>,
}

impl Supervisor {
    /// A supervisor with the default restart policy.
    pub fn new() -> Self {
        Self::with_config(SupervisorConfig::default())
    }

    /// A supervisor with an explicit restart policy.
    pub fn with_config(config: SupervisorConfig) -> Self {
        Supervisor {
            config,
            blocks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Launch a block's activity. The returned token addresses it for
    /// [`Supervisor::remove`] and [`Supervisor::state`].
    pub async fn add(&self, block: Block) -> Token {
        let token = Token::new();
        let state = Arc::new(Mutex::new(ActivityState::Created));
        let monitor = tokio::spawn(monitor(
            block.clone(),
            Arc::clone(&state),
            self.config.clone(),
        ));
        self.blocks.lock().await.insert(
            token,
            Supervised {
                block,
                monitor,
                state,
            },
        );
        token
    }

    /// Stop a block's activity and forget it. In-flight messages are not
    /// drained.
    pub async fn remove(&self, token: Token) -> Result<(), SupervisorError> {
        let supervised = self
            .blocks
            .lock()
            .await
            .remove(&token)
            .ok_or(SupervisorError::UnknownToken(token))?;
        // the stop errors if the activity is already gone
        let _ = supervised.block.stop().await;
        let _ = supervised.monitor.await;
        Ok(())
    }

    /// The lifecycle state of a supervised activity, if the token is
    /// known.
    pub async fn state(&self, token: Token) -> Option<ActivityState> {
        let blocks = self.blocks.lock().await;
        let supervised = blocks.get(&token)?;
        let state = *supervised.state.lock().await;
        Some(state)
    }

    /// Stop every supervised activity.
    pub async fn shutdown(&self) {
        let tokens: Vec<Token> = self.blocks.lock().await.keys().copied().collect();
        for token in tokens {
            let _ = self.remove(token).await;
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Supervisor::new()
    }
}

async fn monitor(block: Block, state: Arc<Mutex<ActivityState>>, config: SupervisorConfig) {
    let mut restarts: VecDeque<Instant> = VecDeque::new();
    loop {
        *state.lock().await = ActivityState::Running;
        let serving = block.clone();
        let activity = tokio::spawn(async move { serving.serve().await });

        match activity.await {
            Ok(()) => {
                *state.lock().await = ActivityState::Stopped;
                return;
            }
            Err(join_error) if join_error.is_panic() => {
                let now = Instant::now();
                restarts.push_back(now);
                while let Some(oldest) = restarts.front() {
                    if now.duration_since(*oldest) > config.restart_window {
                        restarts.pop_front();
                    } else {
                        break;
                    }
                }
                if restarts.len() > config.max_restarts {
                    log::error!(
                        "block panicked {} times within {:?}; giving up",
                        restarts.len(),
                        config.restart_window
                    );
                    block.seal().await;
                    *state.lock().await = ActivityState::Failed;
                    return;
                }
                log::warn!("block panicked; restarting with fresh cycle state");
                block.reset_cycle().await;
            }
            Err(_) => {
                // cancelled from outside; nothing to restart
                *state.lock().await = ActivityState::Stopped;
                return;
            }
        }
    }
}
