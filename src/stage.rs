//! Playback stages and the activity columns they map onto.
//!
//! Every stage is the same procedure run against a different set of columns,
//! so the column choice lives here as data and the delivery logic in
//! [`crate::playback`] stays stage-agnostic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::schema::{Exuser, Logs, Schedule};

/// Audio segments of an exam sitting, in the order they are played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Countdown,
    Trial,
    Passage1,
    Passage2,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Countdown,
        Stage::Trial,
        Stage::Passage1,
        Stage::Passage2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Countdown => "countdown",
            Stage::Trial => "trial",
            Stage::Passage1 => "passage1",
            Stage::Passage2 => "passage2",
        }
    }

    /// exuser column holding the resume position for this stage
    pub fn position_column(self) -> Exuser {
        match self {
            Stage::Countdown => Exuser::CountdownPosition,
            Stage::Trial => Exuser::TrialPosition,
            Stage::Passage1 => Exuser::LastPlayedPosition,
            Stage::Passage2 => Exuser::LastPlayedPosition2,
        }
    }

    /// schedule column holding the audio link for this stage
    pub fn link_column(self) -> Schedule {
        match self {
            Stage::Countdown => Schedule::Countdown,
            Stage::Trial => Schedule::Trialaudio,
            Stage::Passage1 => Schedule::Link1,
            Stage::Passage2 => Schedule::Link2,
        }
    }

    pub fn activity(self) -> Activity {
        match self {
            Stage::Countdown => Activity::Countdown,
            Stage::Trial => Activity::TrialPassage,
            Stage::Passage1 => Activity::Passage1,
            Stage::Passage2 => Activity::Passage2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown stage '{}'", s))
    }
}

/// One timestamp column of the logs table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Login,
    Logout,
    Information,
    Instruction,
    TestAudio,
    TrialPassage,
    Passage1,
    Passage2,
    Countdown,
}

impl Activity {
    /// Pages a client may mark directly; the rest are recorded by the server
    pub const PAGE_EVENTS: [Activity; 2] = [Activity::Information, Activity::Instruction];

    pub fn column(self) -> Logs {
        match self {
            Activity::Login => Logs::Logging,
            Activity::Logout => Logs::Logout,
            Activity::Information => Logs::Information,
            Activity::Instruction => Logs::Instruction,
            Activity::TestAudio => Logs::Testaudio,
            Activity::TrialPassage => Logs::TrialPassage,
            Activity::Passage1 => Logs::Passage1,
            Activity::Passage2 => Logs::Passage2,
            Activity::Countdown => Logs::Countdown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Activity::Login => "login",
            Activity::Logout => "logout",
            Activity::Information => "information",
            Activity::Instruction => "instruction",
            Activity::TestAudio => "testaudio",
            Activity::TrialPassage => "trial_passage",
            Activity::Passage1 => "passage1",
            Activity::Passage2 => "passage2",
            Activity::Countdown => "countdown",
        }
    }

    /// Resolve a client-markable page event by name
    pub fn page_event(name: &str) -> Option<Activity> {
        Activity::PAGE_EVENTS
            .into_iter()
            .find(|activity| activity.as_str().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::Iden;

    #[test]
    fn test_stage_columns() {
        assert_eq!(Stage::Passage1.position_column().to_string(), "last_played_position");
        assert_eq!(Stage::Passage2.position_column().to_string(), "last_played_position2");
        assert_eq!(Stage::Passage1.link_column().to_string(), "link_1");
        assert_eq!(Stage::Trial.link_column().to_string(), "trialaudio");
        assert_eq!(Stage::Trial.activity().column().to_string(), "trial_passage");
        assert_eq!(Stage::Countdown.activity().column().to_string(), "countdown");
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!("passage2".parse::<Stage>().unwrap(), Stage::Passage2);
        assert_eq!("Countdown".parse::<Stage>().unwrap(), Stage::Countdown);
        assert!("passage3".parse::<Stage>().is_err());
    }

    #[test]
    fn test_page_events_exclude_server_recorded_columns() {
        assert_eq!(Activity::page_event("information"), Some(Activity::Information));
        assert_eq!(Activity::page_event("Instruction"), Some(Activity::Instruction));
        assert_eq!(Activity::page_event("passage1"), None);
        assert_eq!(Activity::page_event("login"), None);
    }

    #[test]
    fn test_log_column_names_keep_mixed_casing() {
        assert_eq!(Logs::Logging.to_string(), "Logging");
        assert_eq!(Logs::Instruction.to_string(), "Instruction");
    }
}
