//! Story genres and their narration templates
//!
//! A genre is chosen at join time and must match between both joiners. All
//! genre-specific behavior lives in the instruction template handed to the
//! narration backend; the coordination core never branches on it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    TruthOrDare,
    AccidentalEncounter,
    HorrorAuto,
    BackToSchool,
    OldFriendsReunion,
    MidnightParcel,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::TruthOrDare,
        Genre::AccidentalEncounter,
        Genre::HorrorAuto,
        Genre::BackToSchool,
        Genre::OldFriendsReunion,
        Genre::MidnightParcel,
    ];

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Genre::TruthOrDare => "Truth or Dare (Pub)",
            Genre::AccidentalEncounter => "Accidental Encounter (Café)",
            Genre::HorrorAuto => "Horror Auto Ride",
            Genre::BackToSchool => "Back to School",
            Genre::OldFriendsReunion => "Old Friends Reunion",
            Genre::MidnightParcel => "Midnight Parcel",
        }
    }

    /// Opening line used when the narration backend cannot provide one.
    pub fn hook(self) -> &'static str {
        match self {
            Genre::TruthOrDare => {
                "*The bottle spins, stops between you two. Everyone watches.* Truth or dare?"
            }
            Genre::AccidentalEncounter => {
                "*Light rain taps the café window.* Morning rush. Coffee spills, phones drop. One story begins."
            }
            Genre::HorrorAuto => {
                "*Muffled engine hum.* 1:30 AM, same auto. The driver whispers: \"You're the seventh pair this month.\""
            }
            Genre::BackToSchool => {
                "*Bell echo, chalk dust.* You wake in your 12th-grade classroom. The exam sheet reads: collaboration mandatory."
            }
            Genre::OldFriendsReunion => {
                "*The reunion hall is empty. Doors click shut.* A projector flickers to life. A whisper: \"Remember?\""
            }
            Genre::MidnightParcel => {
                "*Rain, a ticking clock.* A courier delivers half a parcel. The note says: \"Meet at 12:00 AM.\""
            }
        }
    }

    /// Ambience tagline shown alongside the genre.
    pub fn ambience(self) -> &'static str {
        match self {
            Genre::TruthOrDare => "lo-fi beats, glass clinks, laughter to hush",
            Genre::AccidentalEncounter => "light rain, café jazz, soft piano",
            Genre::HorrorAuto => "muffled hum, silence, bass rumble",
            Genre::BackToSchool => "bell echo, chalk, fan hum, nostalgic piano",
            Genre::OldFriendsReunion => "projector flicker, thunder, strings",
            Genre::MidnightParcel => "rain, ticking clock, synth pulse",
        }
    }

    /// Genre-specific instructions injected into the narration prompt.
    pub fn instructions(self) -> &'static str {
        match self {
            Genre::TruthOrDare => {
                "You are the echo of a night replaying itself. The participants pose truths \
                 and dares to each other; you only narrate the shared consequences, teasing \
                 and intimate. Every choice costs or returns time, announce it."
            }
            Genre::AccidentalEncounter => {
                "You are a sarcastic narrator and mood conductor in a café. Never address \
                 the participants directly; describe what just happened with dry humor and \
                 ambient sound cues. Short beats, one per turn."
            }
            Genre::HorrorAuto => {
                "You are the cold, breathing trap around a late-night auto ride. Ignore \
                 jokes and tone-breakers; answer them by removing safety. Clinical dread, \
                 at most two short sentences, never reassure."
            }
            Genre::BackToSchool => {
                "You are the sarcastic ghost commentator of a 12th-grade classroom. Amplify \
                 confessions with witty one-liners and chalk-dust ambience. When a topic is \
                 spent, quietly read out the next question from the exam sheet."
            }
            Genre::OldFriendsReunion => {
                "You are the echo of memory in an empty reunion hall. Reflect and amplify \
                 their nostalgia with wit and drama; fill pauses with projector hum and \
                 distant school bells. You reflect chemistry, you never steer it."
            }
            Genre::MidnightParcel => {
                "You are the courier's unseen dispatcher. Each narration reveals one more \
                 detail of the half-delivered parcel and the hour ticking toward midnight. \
                 Keep the mystery a half-step ahead of them."
            }
        }
    }
}
