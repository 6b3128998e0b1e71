use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::media::{self, Resolution};
use crate::source::{self, DataSource};
use crate::state::{Delta, ProviderCommand};

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub data: DataSource,
    pub media: DataSource,
    pub parallelism: usize,
    pub timeout: Duration,
}

/// Run the I/O worker. Each command is handled on the pool so chapters and
/// media lookups finish independently, in whatever order the network allows.
pub fn spawn_provider(
    config: ProviderConfig,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let pool = match ThreadPoolBuilder::new()
            .num_threads(config.parallelism)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] Worker pool unavailable, running inline: {err}"
                )));
                None
            }
        };

        while let Ok(cmd) = cmd_rx.recv() {
            dispatch(pool.as_ref(), &config, &tx, cmd);
        }
    })
}

fn dispatch(pool: Option<&ThreadPool>, config: &ProviderConfig, tx: &Sender<Delta>, cmd: ProviderCommand) {
    let config = config.clone();
    let tx = tx.clone();
    let job = move || handle_command(&config, &tx, cmd);
    match pool {
        Some(pool) => pool.spawn(job),
        None => job(),
    }
}

pub fn handle_command(config: &ProviderConfig, tx: &Sender<Delta>, cmd: ProviderCommand) {
    match cmd {
        ProviderCommand::LoadChapter {
            chapter,
            token,
            requests,
        } => {
            // Issued together, delivered together.
            let results = requests
                .par_iter()
                .map(|req| {
                    (
                        req.id,
                        source::fetch_json(&config.data, &req.location, config.timeout),
                    )
                })
                .collect::<Vec<_>>();
            if !token.is_live() {
                return;
            }
            let _ = tx.send(Delta::ChapterLoaded {
                chapter,
                token,
                results,
            });
        }
        ProviderCommand::ResolveMedia {
            key,
            token,
            candidates,
        } => {
            let resolution = media::resolve_candidates(&candidates, &token, |candidate| {
                let location = config.media.resolve(candidate);
                source::can_load(&config.media, &location, config.timeout)
            });
            if resolution == Resolution::Cancelled {
                return;
            }
            let _ = tx.send(Delta::MediaResolved {
                key,
                token,
                resolution,
            });
        }
    }
}
