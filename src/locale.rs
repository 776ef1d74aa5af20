//! User-facing strings in the five supported languages.
//!
//! Everything here is plain ASCII: the display font has no accented glyphs.

/// Display language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Locale {
    #[default]
    En = 0,
    It = 1,
    Es = 2,
    Fr = 3,
    De = 4,
}

impl Locale {
    pub const ALL: [Locale; 5] = [Locale::En, Locale::It, Locale::Es, Locale::Fr, Locale::De];

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    /// The language's own name.
    pub fn native_name(self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::It => "Italiano",
            Locale::Es => "Espanol",
            Locale::Fr => "Francais",
            Locale::De => "Deutsch",
        }
    }
}

/// Translatable labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Menu,
    Initialize,
    UtcOffset,
    Language,
    DateView,
    Version,
    Chronometer,
    GpsData,
    Searching,
    Select,
    Rescan,
    Connecting,
    Waiting,
    NmeaLines,
    NoFix,
}

/// Look up a label.
pub fn label(locale: Locale, label: Label) -> &'static str {
    let row = match label {
        Label::Menu => ["Menu", "Menu", "Menu", "Menu", "Menue"],
        Label::Initialize => ["Re-pair GPS", "Riassocia GPS", "Reemparejar", "Reappairer", "GPS koppeln"],
        Label::UtcOffset => ["UTC offset", "Fuso UTC", "Desfase UTC", "Decalage UTC", "UTC-Versatz"],
        Label::Language => ["Language", "Lingua", "Idioma", "Langue", "Sprache"],
        Label::DateView => ["Date format", "Formato data", "Formato fecha", "Format date", "Datumsformat"],
        Label::Version => ["Version", "Versione", "Version", "Version", "Version"],
        Label::Chronometer => ["Stopwatch", "Cronometro", "Cronometro", "Chronometre", "Stoppuhr"],
        Label::GpsData => ["GPS data", "Dati GPS", "Datos GPS", "Donnees GPS", "GPS-Daten"],
        Label::Searching => ["Searching...", "Ricerca...", "Buscando...", "Recherche...", "Suche..."],
        Label::Select => ["Select GPS", "Scegli GPS", "Elige GPS", "Choisir GPS", "GPS waehlen"],
        Label::Rescan => ["Rescan", "Ricerca", "Buscar", "Relancer", "Neu suchen"],
        Label::Connecting => ["Connecting", "Connessione", "Conectando", "Connexion", "Verbinde"],
        Label::Waiting => ["Please wait", "Attendere", "Espere", "Patientez", "Bitte warten"],
        Label::NmeaLines => ["Lines", "Righe", "Lineas", "Lignes", "Zeilen"],
        Label::NoFix => ["No fix", "No fix", "Sin fix", "Pas de fix", "Kein Fix"],
    };
    row[locale as usize]
}

const WEEKDAYS: [[&str; 7]; 5] = [
    ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
    ["Lun", "Mar", "Mer", "Gio", "Ven", "Sab", "Dom"],
    ["Lun", "Mar", "Mie", "Jue", "Vie", "Sab", "Dom"],
    ["Lun", "Mar", "Mer", "Jeu", "Ven", "Sam", "Dim"],
    ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"],
];

/// Weekday abbreviation, Monday = 0.
pub fn weekday(locale: Locale, day: u8) -> &'static str {
    WEEKDAYS[locale as usize]
        .get(usize::from(day))
        .copied()
        .unwrap_or("")
}
