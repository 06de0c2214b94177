/// Keyword is a JSON-Schema keyword whose value holds one or more subschemas
/// that the traversal descends into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    AnyOf,
    AllOf,
    OneOf,
    Items,
    AdditionalItems,
    Properties,
    PatternProperties,
    AdditionalProperties,
}

/// Shape of the value held by a child-bearing keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A single subschema (which may be a boolean).
    Single,
    /// An ordered list of subschemas.
    List,
    /// A map of names (or patterns) to subschemas.
    Map,
    /// Either a single subschema or an ordered list of them.
    SingleOrList,
}

impl Keyword {
    /// All child-bearing keywords, in traversal order.
    pub const ALL: [Keyword; 8] = [
        Keyword::AnyOf,
        Keyword::AllOf,
        Keyword::OneOf,
        Keyword::Items,
        Keyword::AdditionalItems,
        Keyword::Properties,
        Keyword::PatternProperties,
        Keyword::AdditionalProperties,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::AnyOf => ANY_OF,
            Keyword::AllOf => ALL_OF,
            Keyword::OneOf => ONE_OF,
            Keyword::Items => ITEMS,
            Keyword::AdditionalItems => ADDITIONAL_ITEMS,
            Keyword::Properties => PROPERTIES,
            Keyword::PatternProperties => PATTERN_PROPERTIES,
            Keyword::AdditionalProperties => ADDITIONAL_PROPERTIES,
        }
    }

    /// Returns the Keyword named by `keyword`, or None if it doesn't hold subschemas.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            ANY_OF => Keyword::AnyOf,
            ALL_OF => Keyword::AllOf,
            ONE_OF => Keyword::OneOf,
            ITEMS => Keyword::Items,
            ADDITIONAL_ITEMS => Keyword::AdditionalItems,
            PROPERTIES => Keyword::Properties,
            PATTERN_PROPERTIES => Keyword::PatternProperties,
            ADDITIONAL_PROPERTIES => Keyword::AdditionalProperties,
            _ => return None,
        })
    }

    pub fn shape(&self) -> Shape {
        match self {
            Keyword::AnyOf | Keyword::AllOf | Keyword::OneOf => Shape::List,
            Keyword::Items => Shape::SingleOrList,
            Keyword::AdditionalItems | Keyword::AdditionalProperties => Shape::Single,
            Keyword::Properties | Keyword::PatternProperties => Shape::Map,
        }
    }

    /// Combinators are applicators which, when present, take precedence
    /// over the items and properties family of keywords.
    pub fn is_combinator(&self) -> bool {
        matches!(self, Keyword::AnyOf | Keyword::AllOf | Keyword::OneOf)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const ADDITIONAL_ITEMS: &str = "additionalItems"; // Legacy 2019-09 keyword for `items`.
pub const ADDITIONAL_PROPERTIES: &str = "additionalProperties";
pub const ALL_OF: &str = "allOf";
pub const ANY_OF: &str = "anyOf";
pub const ITEMS: &str = "items";
pub const ONE_OF: &str = "oneOf";
pub const PATTERN_PROPERTIES: &str = "patternProperties";
pub const PROPERTIES: &str = "properties";
