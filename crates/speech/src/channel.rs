//! Scripted audio channel
//!
//! Stands in for a phone line: plays are recorded as text, captures pop the
//! next scripted respondent turn. Waiting happens on the tokio clock, so
//! tests with a paused runtime see time-budget effects without real delays.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use interview_agent_core::{AudioChannel, AudioClip, AudioEncoding, Error, Result};

/// One respondent turn
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedTurn {
    /// Answer immediately
    Say(String),
    /// Answer after a pause; a pause longer than the listen timeout is heard
    /// as silence and the answer is lost
    SayAfter(Duration, String),
    /// Stay quiet until the listen timeout expires
    Silence,
    /// The line drops while listening
    Fail(String),
}

impl ScriptedTurn {
    pub fn say(text: impl Into<String>) -> Self {
        ScriptedTurn::Say(text.into())
    }
}

/// Audio channel replaying scripted respondent turns
pub struct ScriptedAudioChannel {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    played: Mutex<Vec<String>>,
    play_duration: Option<Duration>,
    closed: AtomicBool,
}

impl ScriptedAudioChannel {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            played: Mutex::new(Vec::new()),
            play_duration: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Channel whose respondent answers every prompt immediately, in order
    pub fn from_answers<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(answers.into_iter().map(|a| ScriptedTurn::Say(a.into())))
    }

    /// Time every played clip takes to deliver
    pub fn with_play_duration(mut self, duration: Duration) -> Self {
        self.play_duration = Some(duration);
        self
    }

    /// Text of every clip played so far
    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    /// True if any played line contains `needle`
    pub fn played_contains(&self, needle: &str) -> bool {
        self.played.lock().iter().any(|line| line.contains(needle))
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn clip(text: &str) -> AudioClip {
        AudioClip::new(text.as_bytes().to_vec(), AudioEncoding::Pcm16, 16_000)
    }
}

#[async_trait]
impl AudioChannel for ScriptedAudioChannel {
    async fn play(&self, _clip: AudioClip, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Audio("channel closed".to_string()));
        }
        self.played.lock().push(text.to_string());
        if let Some(duration) = self.play_duration {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }

    async fn capture(&self, timeout: Duration) -> Result<Option<AudioClip>> {
        if self.is_closed() {
            return Err(Error::Audio("channel closed".to_string()));
        }

        let turn = self.turns.lock().pop_front();
        match turn {
            Some(ScriptedTurn::Say(text)) => Ok(Some(Self::clip(&text))),
            Some(ScriptedTurn::SayAfter(delay, text)) => {
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    Ok(None)
                } else {
                    tokio::time::sleep(delay).await;
                    Ok(Some(Self::clip(&text)))
                }
            }
            Some(ScriptedTurn::Fail(message)) => Err(Error::Audio(message)),
            Some(ScriptedTurn::Silence) | None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
