//! Core type definitions for operations, content units and collections.
//!
//! Operation types are serialized in snake_case (as they appear in the
//! pipeline event names), content unit and collection types in
//! SCREAMING_SNAKE_CASE (as they appear in CIT metadata).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// All known values.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Canonical text form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", $what, s)),
                }
            }
        }
    };
}

string_enum!(
    /// Type of a studio pipeline operation.
    OperationType, "operation type" {
        CaptureStart => "capture_start",
        CaptureStop => "capture_stop",
        Demux => "demux",
        Trim => "trim",
        Send => "send",
        Convert => "convert",
        Upload => "upload",
        Sirtutim => "sirtutim",
        Insert => "insert",
        Transcode => "transcode",
        Join => "join",
    }
);

string_enum!(
    /// Type of a content unit.
    ContentUnitType, "content unit type" {
        LessonPart => "LESSON_PART",
        Lecture => "LECTURE",
        ChildrenLessonPart => "CHILDREN_LESSON_PART",
        WomenLessonPart => "WOMEN_LESSON_PART",
        VirtualLesson => "VIRTUAL_LESSON",
        FriendsGathering => "FRIENDS_GATHERING",
        Meal => "MEAL",
        VideoProgramChapter => "VIDEO_PROGRAM_CHAPTER",
        FullLesson => "FULL_LESSON",
        Text => "TEXT",
        EventPart => "EVENT_PART",
        Unknown => "UNKNOWN",
        Clip => "CLIP",
        Training => "TRAINING",
        KiteiMakor => "KITEI_MAKOR",
        ResearchMaterial => "RESEARCH_MATERIAL",
        Publication => "PUBLICATION",
    }
);

impl ContentUnitType {
    /// Lesson types reconciled into a collection by their capture id.
    pub fn is_lesson(&self) -> bool {
        matches!(self, Self::LessonPart | Self::FullLesson)
    }
}

string_enum!(
    /// Type of a collection.
    CollectionType, "collection type" {
        DailyLesson => "DAILY_LESSON",
        SaturdayLesson => "SATURDAY_LESSON",
        FriendsGatherings => "FRIENDS_GATHERINGS",
        Congress => "CONGRESS",
        VideoProgram => "VIDEO_PROGRAM",
        LectureSeries => "LECTURE_SERIES",
        Meals => "MEALS",
        Holiday => "HOLIDAY",
        Picnic => "PICNIC",
        UnityDay => "UNITY_DAY",
    }
);

impl CollectionType {
    /// Daily and Saturday lessons hold a "full" slot for the full lesson.
    pub fn is_lesson_day(&self) -> bool {
        matches!(self, Self::DailyLesson | Self::SaturdayLesson)
    }
}

string_enum!(
    /// Role of a person in a content unit.
    PersonRole, "person role" {
        Lecturer => "LECTURER",
    }
);

/// Access level of files, units and collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    #[default]
    Public,
    Sensitive,
    Private,
}

impl SecurityLevel {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Public => 0,
            Self::Sensitive => 1,
            Self::Private => 2,
        }
    }

    pub fn from_i32(level: i32) -> Self {
        match level {
            0 => Self::Public,
            1 => Self::Sensitive,
            _ => Self::Private,
        }
    }
}
