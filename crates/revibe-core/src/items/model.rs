//! Recyclable item data models.

use std::fmt;

use chrono::{Local, NaiveDateTime};

use super::ideas;

/// Date format of [`Item::created_date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format of [`Item::created_time`].
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Unique identifier for a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Creates a new item ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bin a recyclable item belongs in.
///
/// The store keeps categories as plain text; this enum is the vocabulary
/// validation checks against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinCategory {
    /// Food and garden waste.
    Organic,
    /// Plastic packaging and containers.
    Plastic,
    /// Paper and cardboard.
    Paper,
    /// Glass bottles and jars.
    Glass,
    /// Cans and scrap metal.
    Metal,
    /// Electronic waste.
    Electronics,
    /// Anything else.
    Others,
}

impl BinCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 7] = [
        Self::Organic,
        Self::Plastic,
        Self::Paper,
        Self::Glass,
        Self::Metal,
        Self::Electronics,
        Self::Others,
    ];

    /// Parse from the stored name (exact match).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Convert to the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organic => "Organic",
            Self::Plastic => "Plastic",
            Self::Paper => "Paper",
            Self::Glass => "Glass",
            Self::Metal => "Metal",
            Self::Electronics => "Electronics",
            Self::Others => "Others",
        }
    }
}

impl fmt::Display for BinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recycle or reuse idea for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Idea {
    /// Short headline.
    pub title: String,
    /// What to do.
    pub description: String,
}

impl Idea {
    /// Creates a new idea.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A stored recyclable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Store-assigned identifier.
    pub id: ItemId,
    /// Bin category name.
    pub bin_category: String,
    /// Short title of the item.
    pub description_title: String,
    /// Free-text description.
    pub description: String,
    /// Recycle or reuse ideas, in order.
    pub ideas: Vec<Idea>,
    /// Local or remote image reference.
    pub image_uri: Option<String>,
    /// Creation date (`YYYY-MM-DD`).
    pub created_date: String,
    /// Creation time (`HH:MM:SS`).
    pub created_time: String,
}

impl Item {
    /// Parsed bin category, if it is one of the known set.
    #[must_use]
    pub fn category(&self) -> Option<BinCategory> {
        BinCategory::parse(&self.bin_category)
    }

    /// Creation timestamp, if the stored date and time parse.
    #[must_use]
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(
            &format!("{} {}", self.created_date, self.created_time),
            &format!("{DATE_FORMAT} {TIME_FORMAT}"),
        )
        .ok()
    }

    /// Ideas in their stored text form.
    #[must_use]
    pub fn encoded_ideas(&self) -> String {
        ideas::encode(&self.ideas)
    }
}

/// An item that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    /// Bin category name.
    pub bin_category: String,
    /// Short title of the item.
    pub description_title: String,
    /// Free-text description.
    pub description: String,
    /// Recycle or reuse ideas, in order.
    pub ideas: Vec<Idea>,
    /// Local or remote image reference.
    pub image_uri: Option<String>,
    /// Creation date (`YYYY-MM-DD`).
    pub created_date: String,
    /// Creation time (`HH:MM:SS`).
    pub created_time: String,
}

impl NewItem {
    /// Creates a new item stamped with the current local date and time.
    #[must_use]
    pub fn new(
        bin_category: impl Into<String>,
        description_title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Local::now();
        Self {
            bin_category: bin_category.into(),
            description_title: description_title.into(),
            description: description.into(),
            ideas: Vec::new(),
            image_uri: None,
            created_date: now.format(DATE_FORMAT).to_string(),
            created_time: now.format(TIME_FORMAT).to_string(),
        }
    }

    /// Adds an idea.
    #[must_use]
    pub fn with_idea(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.ideas.push(Idea::new(title, description));
        self
    }

    /// Replaces the ideas.
    #[must_use]
    pub fn with_ideas(mut self, ideas: Vec<Idea>) -> Self {
        self.ideas = ideas;
        self
    }

    /// Sets the image reference.
    #[must_use]
    pub fn with_image_uri(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    /// Overrides the creation stamp.
    #[must_use]
    pub fn with_created(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.created_date = date.into();
        self.created_time = time.into();
        self
    }

    /// Attaches the store-assigned id.
    #[must_use]
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            bin_category: self.bin_category,
            description_title: self.description_title,
            description: self.description,
            ideas: self.ideas,
            image_uri: self.image_uri,
            created_date: self.created_date,
            created_time: self.created_time,
        }
    }
}

/// Replacement values for the mutable fields of an item.
///
/// Creation date and time are never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    /// Bin category name.
    pub bin_category: String,
    /// Short title of the item.
    pub description_title: String,
    /// Free-text description.
    pub description: String,
    /// Recycle or reuse ideas, in order.
    pub ideas: Vec<Idea>,
    /// Local or remote image reference.
    pub image_uri: Option<String>,
}

impl From<&Item> for ItemUpdate {
    fn from(item: &Item) -> Self {
        Self {
            bin_category: item.bin_category.clone(),
            description_title: item.description_title.clone(),
            description: item.description.clone(),
            ideas: item.ideas.clone(),
            image_uri: item.image_uri.clone(),
        }
    }
}
