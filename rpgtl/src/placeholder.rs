//! Placeholder codec for RPG Maker control codes
//!
//! Message text in RPG Maker carries inline escape codes such as `\C[2]`
//! (text colour), `\I[64]` (icon), `\N[1]` (actor name) or `\V[12]`
//! (variable value). Language models happily translate, reorder or
//! "fix" these, which corrupts the game data. Before a payload is sent,
//! every control code is swapped for an opaque placeholder like
//! `{Color_0}`; after translation the placeholders are swapped back.
//!
//! Codes are scanned in six categories, most specific first, and each
//! pass runs on the output of the previous one so a broad pattern never
//! swallows a code that a narrower pattern already captured:
//!
//! | Order | Category | Example          | Placeholder   |
//! |-------|----------|------------------|---------------|
//! | 1     | Nested   | `\C[\V[3]]`      | `{Nested_0}`  |
//! | 2     | Icon     | `\I[64]`         | `{Icon_0}`    |
//! | 3     | Color    | `\C[2]`          | `{Color_0}`   |
//! | 4     | Name     | `\N[1]`          | `{Name_0}`    |
//! | 5     | Var      | `\V[12]`         | `{Var_0}`     |
//! | 6     | Code     | `\FS[24]`        | `{Code_0}`    |
//!
//! Identical codes collapse to one placeholder: `\C[2]a\C[2]` masks to
//! `{Color_0}a{Color_0}`.
//!
//! # Example
//!
//! ```
//! use rpgtl::placeholder::{mask, unmask};
//!
//! let masked = mask("\\C[2]勇者\\C[0]は\\I[64]を手に入れた");
//! assert_eq!(masked.text, "{Color_0}勇者{Color_1}は{Icon_0}を手に入れた");
//!
//! let restored = unmask("{Color_0}The hero{Color_1} got {Icon_0}", &masked.map);
//! assert_eq!(restored, "\\C[2]The hero\\C[0] got \\I[64]");
//! ```

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// The six kinds of control code, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderCategory {
    /// A code whose argument is itself a code: `\C[\V[3]]`
    Nested,
    /// Icon and asset references: `\I[n]`, `\K[n]`, `\W[n]`, `\A[n]`
    Icon,
    /// Text colour: `\C[n]`
    Color,
    /// Actor / party member names: `\N[n]`
    Name,
    /// Numbered variables: `\V[n]`
    Var,
    /// Any other bracketed code: `\FS[24]`, `\PX[10]`, plugin codes
    Code,
}

impl PlaceholderCategory {
    /// All categories in scan order
    pub const ALL: [PlaceholderCategory; 6] = [
        PlaceholderCategory::Nested,
        PlaceholderCategory::Icon,
        PlaceholderCategory::Color,
        PlaceholderCategory::Name,
        PlaceholderCategory::Var,
        PlaceholderCategory::Code,
    ];

    /// Label used inside the placeholder, e.g. `Color` in `{Color_0}`
    pub fn label(self) -> &'static str {
        match self {
            PlaceholderCategory::Nested => "Nested",
            PlaceholderCategory::Icon => "Icon",
            PlaceholderCategory::Color => "Color",
            PlaceholderCategory::Name => "Name",
            PlaceholderCategory::Var => "Var",
            PlaceholderCategory::Code => "Code",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    fn pattern(self) -> &'static Regex {
        match self {
            PlaceholderCategory::Nested => &*NESTED_RE,
            PlaceholderCategory::Icon => &*ICON_RE,
            PlaceholderCategory::Color => &*COLOR_RE,
            PlaceholderCategory::Name => &*NAME_RE,
            PlaceholderCategory::Var => &*VAR_RE,
            PlaceholderCategory::Code => &*CODE_RE,
        }
    }

    /// Render the placeholder for the `n`th distinct code of this category
    pub fn placeholder(self, n: usize) -> String {
        format!("{{{}_{}}}", self.label(), n)
    }
}

static NESTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+\w+\[\\+\w+\[[0-9]+\]\]").expect("nested code regex"));
static ICON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+[iIkKwWaA]+\[[0-9]+\]").expect("icon code regex"));
static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+[cC]\[[0-9]+\]").expect("color code regex"));
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+[nN]\[.+?\]+").expect("name code regex"));
static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+[vV]\[[0-9]+\]").expect("variable code regex"));
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\+\w+\[.+?\]").expect("generic code regex"));

/// Placeholders as they come back from the model. Stray inner spaces
/// (`{ Color_0 }`) are tolerated.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\s*(Nested|Icon|Color|Name|Var|Code)_(\d+)\s*\}").expect("placeholder regex")
});

/// A control code the model padded with spaces: `\C[ 2 ]`
static BRACKET_SPACING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\+\w+)\[\s*([^\[\]]*?)\s*\]").expect("bracket spacing regex"));

/// The codes captured by one [`mask`] call, one ordered set per category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    sets: [IndexSet<String>; 6],
}

impl PlaceholderMap {
    /// The original code behind placeholder `{Category_n}`
    pub fn get(&self, category: PlaceholderCategory, n: usize) -> Option<&str> {
        self.sets[category.index()].get_index(n).map(String::as_str)
    }

    /// All codes captured for one category, in placeholder order
    pub fn codes(&self, category: PlaceholderCategory) -> impl Iterator<Item = &str> {
        self.sets[category.index()].iter().map(String::as_str)
    }

    /// Total number of distinct codes across categories
    pub fn len(&self) -> usize {
        self.sets.iter().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of masking a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masked {
    /// Text with every control code replaced by a placeholder
    pub text: String,
    /// What each placeholder stands for
    pub map: PlaceholderMap,
}

/// Replace control codes in `text` with `{Category_N}` placeholders
///
/// N counts distinct codes within one category, starting at zero, in
/// order of first appearance.
pub fn mask(text: &str) -> Masked {
    let mut map = PlaceholderMap::default();
    let mut current = text.to_string();

    for category in PlaceholderCategory::ALL {
        let pattern = category.pattern();
        let set = &mut map.sets[category.index()];
        for m in pattern.find_iter(&current) {
            set.insert(m.as_str().to_string());
        }
        if set.is_empty() {
            continue;
        }

        current = pattern
            .replace_all(&current, |caps: &Captures<'_>| {
                // every match was inserted above
                let n = set.get_index_of(&caps[0]).unwrap_or_default();
                category.placeholder(n)
            })
            .into_owned();
    }

    Masked { text: current, map }
}

/// Restore the control codes in a translated string
///
/// Categories are restored from the last scanned to the first, the
/// reverse of the scan order, so a generic code whose argument captured an
/// earlier placeholder is expanded before that inner placeholder is
/// resolved. Restoring in scan order would leave the inner placeholder in
/// the output. Placeholders the model dropped are simply absent from the
/// result; placeholders it invented are left as they are.
pub fn unmask(translated: &str, map: &PlaceholderMap) -> String {
    let mut text = BRACKET_SPACING_RE
        .replace_all(translated, "${1}[${2}]")
        .into_owned();

    if map.is_empty() {
        return text;
    }

    for category in PlaceholderCategory::ALL.into_iter().rev() {
        if map.sets[category.index()].is_empty() {
            continue;
        }
        text = PLACEHOLDER_RE
            .replace_all(&text, |caps: &Captures<'_>| {
                let restored = PlaceholderCategory::from_label(&caps[1])
                    .filter(|c| *c == category)
                    .and_then(|c| caps[2].parse::<usize>().ok().and_then(|n| map.get(c, n)));
                match restored {
                    Some(code) => code.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned();
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) -> String {
        let masked = mask(text);
        unmask(&masked.text, &masked.map)
    }

    #[test]
    fn test_each_category_gets_its_own_label() {
        let masked = mask("\\C[\\V[3]]\\I[5]\\C[2]\\N[1]\\V[9]\\FS[24]");
        assert_eq!(
            masked.text,
            "{Nested_0}{Icon_0}{Color_0}{Name_0}{Var_0}{Code_0}"
        );
        assert_eq!(masked.map.len(), 6);
        assert_eq!(masked.map.get(PlaceholderCategory::Nested, 0), Some("\\C[\\V[3]]"));
        assert_eq!(masked.map.get(PlaceholderCategory::Code, 0), Some("\\FS[24]"));
    }

    #[test]
    fn test_counters_are_per_category() {
        let masked = mask("\\C[1]a\\C[2]b\\V[1]c\\V[2]");
        assert_eq!(masked.text, "{Color_0}a{Color_1}b{Var_0}c{Var_1}");
    }

    #[test]
    fn test_duplicate_codes_share_one_placeholder() {
        let masked = mask("\\C[2]赤\\C[0]と\\C[2]青\\C[0]");
        assert_eq!(masked.text, "{Color_0}赤{Color_1}と{Color_0}青{Color_1}");
        assert_eq!(masked.map.codes(PlaceholderCategory::Color).count(), 2);
    }

    #[test]
    fn test_round_trip_is_identity() {
        for text in [
            "",
            "プレーンテキスト",
            "\\C[2]勇者\\C[0]は\\I[64]を手に入れた",
            "\\N[1]「\\V[10]ゴールドだ」",
            "\\C[\\V[3]]ネスト\\FS[24]大\\PX[10]",
            "\\\\C[4]二重\\\\C[0]",
            "\\C[2]x\\C[2]y\\C[2]",
            "[ 括弧 ] はそのまま",
        ] {
            assert_eq!(round_trip(text), text, "round trip failed for {text:?}");
        }
    }

    #[test]
    fn test_generic_code_wrapping_an_earlier_placeholder() {
        // The color code is captured first, then the generic pattern
        // swallows the bracket that now contains its placeholder.
        let text = "\\P[a \\C[1] b]終";
        let masked = mask(text);
        assert_eq!(masked.text, "{Code_0}終");
        assert_eq!(unmask(&masked.text, &masked.map), text);
    }

    #[test]
    fn test_unmask_tolerates_reordering() {
        let masked = mask("\\C[2]名前\\C[0]：\\V[1]");
        let restored = unmask("{Var_0} : {Color_0}Name{Color_1}", &masked.map);
        assert_eq!(restored, "\\V[1] : \\C[2]Name\\C[0]");
    }

    #[test]
    fn test_unmask_tolerates_dropped_placeholder() {
        let masked = mask("\\C[2]勇者\\C[0]");
        let restored = unmask("{Color_0}Hero", &masked.map);
        assert_eq!(restored, "\\C[2]Hero");
    }

    #[test]
    fn test_unmask_leaves_unknown_placeholders() {
        let masked = mask("\\C[2]勇者");
        let restored = unmask("{Color_0}Hero {Color_7} {Icon_0}", &masked.map);
        assert_eq!(restored, "\\C[2]Hero {Color_7} {Icon_0}");
    }

    #[test]
    fn test_unmask_trims_padded_placeholders_and_codes() {
        let masked = mask("\\I[5]剣");
        assert_eq!(unmask("{ Icon_0 } Sword", &masked.map), "\\I[5] Sword");
        assert_eq!(
            unmask("\\C[ 2 ]Sword", &PlaceholderMap::default()),
            "\\C[2]Sword"
        );
    }
}
