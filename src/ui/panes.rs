/// Top-level screens, switched with the global keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Free-text chat with the assistant backend
    Chat,
    /// Contact table, filter bar and list mode
    Contacts,
    /// Property listings and their tours
    Listings,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Chat, Screen::Contacts, Screen::Listings];

    pub fn title(self) -> &'static str {
        match self {
            Screen::Chat => "CHAT",
            Screen::Contacts => "CONTACTS",
            Screen::Listings => "LISTINGS",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Screen::Chat => 0,
            Screen::Contacts => 1,
            Screen::Listings => 2,
        }
    }
}

/// Fields of the contacts filter bar, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Sector,
    Company,
    Notes,
    Linkedin,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [
        FilterField::Sector,
        FilterField::Company,
        FilterField::Notes,
        FilterField::Linkedin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterField::Sector => "SECTOR",
            FilterField::Company => "COMPANY",
            FilterField::Notes => "NOTES",
            FilterField::Linkedin => "LINKEDIN",
        }
    }

    /// Free-text fields take typed characters; the others cycle.
    pub fn is_text(self) -> bool {
        matches!(self, FilterField::Company | FilterField::Notes)
    }

    pub fn next(self) -> Self {
        match self {
            FilterField::Sector => FilterField::Company,
            FilterField::Company => FilterField::Notes,
            FilterField::Notes => FilterField::Linkedin,
            FilterField::Linkedin => FilterField::Sector,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FilterField::Sector => FilterField::Linkedin,
            FilterField::Company => FilterField::Sector,
            FilterField::Notes => FilterField::Company,
            FilterField::Linkedin => FilterField::Notes,
        }
    }
}
