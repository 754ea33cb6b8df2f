//! Single-writer state holder
//!
//! Every write goes through `commit`, which edits the mode flags and
//! optionally replaces the `UiState` in one step. Observers hold a
//! `watch::Receiver` and always see a whole `Snapshot`.

use crate::state::{ModeFlags, Snapshot, UiState};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug)]
pub struct StateStore {
    tx: watch::Sender<Snapshot>,
}

impl StateStore {
    pub fn new(modes: ModeFlags) -> Self {
        let (tx, _) = watch::channel(Snapshot {
            ui: UiState::Idle,
            modes,
            generation: 0,
        });
        Self { tx }
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn ui(&self) -> UiState {
        self.tx.borrow().ui.clone()
    }

    pub fn modes(&self) -> ModeFlags {
        self.tx.borrow().modes.clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Apply one transition. Replacing the UI state bumps the generation.
    pub fn commit<F>(&self, ui: Option<UiState>, edit: F) -> Snapshot
    where
        F: FnOnce(&mut ModeFlags),
    {
        self.tx.send_modify(|snapshot| {
            edit(&mut snapshot.modes);
            if let Some(next) = ui {
                debug!("UI: {:?} -> {:?}", snapshot.ui, next);
                snapshot.ui = next;
                snapshot.generation += 1;
            }
        });
        self.snapshot()
    }

    pub fn set_ui(&self, ui: UiState) -> Snapshot {
        self.commit(Some(ui), |_| {})
    }

    pub fn update_modes<F>(&self, edit: F) -> Snapshot
    where
        F: FnOnce(&mut ModeFlags),
    {
        self.commit(None, edit)
    }
}
