//! Classifier records kept in a word database.
//!
//! Per-token counts are stored as the wrapped type; the training totals live
//! under one reserved key as a plain value.

use serde::{Deserialize, Serialize};
use wordstore_store::{display_key, MutableStore, ReadableStore, StoreError, StoreResult};

use crate::dict::TypedDict;
use crate::record::TypedValue;
use crate::wrapped::Wrapped;

/// Key holding the [`TrainingState`] record.
pub const STATE_KEY: &[u8] = b"saved state";

/// Layout version written into [`TrainingState::version`].
pub const STATE_VERSION: u32 = 5;

/// Spam/ham message counts for one token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WordInfo {
    pub spam_count: u32,
    pub ham_count: u32,
}

impl WordInfo {
    pub fn new(spam_count: u32, ham_count: u32) -> Self {
        Self {
            spam_count,
            ham_count,
        }
    }

    /// Messages of either kind that contained the token.
    pub fn total(&self) -> u64 {
        u64::from(self.spam_count) + u64::from(self.ham_count)
    }
}

impl Wrapped for WordInfo {
    type State = (u32, u32);

    fn to_state(&self) -> Self::State {
        (self.spam_count, self.ham_count)
    }

    fn from_state((spam_count, ham_count): Self::State) -> Self {
        Self::new(spam_count, ham_count)
    }
}

/// Training totals stored under [`STATE_KEY`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    pub version: u32,
    pub nspam: u32,
    pub nham: u32,
}

impl TrainingState {
    pub fn new(nspam: u32, nham: u32) -> Self {
        Self {
            version: STATE_VERSION,
            nspam,
            nham,
        }
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// A word database: [`WordInfo`] per token plus one [`TrainingState`].
pub type WordDict<S> = TypedDict<S, TrainingState, WordInfo>;

impl<S: ReadableStore> TypedDict<S, TrainingState, WordInfo> {
    /// Stored training totals; a fresh database reads as zero counts.
    ///
    /// A record written by an unknown layout version is rejected.
    pub fn training_state(&self) -> StoreResult<TrainingState> {
        match self.get_plain(STATE_KEY)? {
            Some(state) if state.version != STATE_VERSION => Err(StoreError::Deserialization {
                key: display_key(STATE_KEY),
                reason: format!("unknown state version {}", state.version),
            }),
            Some(state) => Ok(state),
            None => Ok(TrainingState::default()),
        }
    }

    pub fn word_info(&self, word: &[u8]) -> StoreResult<Option<WordInfo>> {
        self.get_wrapped(word)
    }

    /// Every token record, leaving out the training state.
    pub fn words(
        &self,
    ) -> StoreResult<impl Iterator<Item = StoreResult<(Vec<u8>, WordInfo)>> + '_> {
        Ok(self.iter_skipping([STATE_KEY])?.map(|entry| -> StoreResult<(Vec<u8>, WordInfo)> {
            let (key, value) = entry?;
            match value {
                TypedValue::Wrapped(info) => Ok((key, info)),
                TypedValue::Plain(_) => Err(StoreError::CorruptRecord {
                    key: display_key(&key),
                    reason: "expected a wrapped record, found plain".into(),
                }),
            }
        }))
    }
}

impl<S: MutableStore> TypedDict<S, TrainingState, WordInfo> {
    pub fn set_training_state(&mut self, state: TrainingState) -> StoreResult<()> {
        self.set_plain(STATE_KEY, state)
    }

    pub fn set_word_info(&mut self, word: &[u8], info: WordInfo) -> StoreResult<()> {
        self.set_wrapped(word, info)
    }
}
