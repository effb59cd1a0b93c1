//! Names of the Lua functions the dialogue runtime registers.

/// Script functions with a native runtime counterpart named `ds_<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFunction {
    Visited,
    VisitedCount,
    Random,
    RandomRange,
    Dice,
    Round,
    RoundPlaces,
    Floor,
    Ceil,
    Inc,
    Dec,
    Decimal,
    Int,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 13] = [
        BuiltinFunction::Visited,
        BuiltinFunction::VisitedCount,
        BuiltinFunction::Random,
        BuiltinFunction::RandomRange,
        BuiltinFunction::Dice,
        BuiltinFunction::Round,
        BuiltinFunction::RoundPlaces,
        BuiltinFunction::Floor,
        BuiltinFunction::Ceil,
        BuiltinFunction::Inc,
        BuiltinFunction::Dec,
        BuiltinFunction::Decimal,
        BuiltinFunction::Int,
    ];

    pub fn from_script_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.script_name() == name)
    }

    pub fn script_name(self) -> &'static str {
        match self {
            BuiltinFunction::Visited => "visited",
            BuiltinFunction::VisitedCount => "visited_count",
            BuiltinFunction::Random => "random",
            BuiltinFunction::RandomRange => "random_range",
            BuiltinFunction::Dice => "dice",
            BuiltinFunction::Round => "round",
            BuiltinFunction::RoundPlaces => "round_places",
            BuiltinFunction::Floor => "floor",
            BuiltinFunction::Ceil => "ceil",
            BuiltinFunction::Inc => "inc",
            BuiltinFunction::Dec => "dec",
            BuiltinFunction::Decimal => "decimal",
            BuiltinFunction::Int => "int",
        }
    }

    pub fn lua_name(self) -> String {
        format!("ds_{}", self.script_name())
    }
}

/// Global table holding script variables.
pub const VARIABLE_TABLE: &str = "Variable";

/// Indirection for user functions: `ds_call('name', args...)`.
pub const CUSTOM_FUNCTION_CALL: &str = "ds_call";

/// Clears the format arguments of an entry, then adds the first one.
pub const CLEAR_AND_ADD_FORMAT_ARG: &str = "ds_clr_add_fmt_arg";

/// Adds one more format argument for an entry.
pub const ADD_FORMAT_ARG: &str = "ds_add_fmt_arg";

/// Runtime counterpart of `<<stop>>`.
pub const STOP_CONVERSATION: &str = "ds_stop";

/// Sequencer directive that advances without waiting.
pub const CONTINUE_SEQUENCE: &str = "Continue()";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lua_names_are_prefixed() {
        assert_eq!(BuiltinFunction::VisitedCount.lua_name(), "ds_visited_count");
        assert_eq!(
            BuiltinFunction::from_script_name("round_places"),
            Some(BuiltinFunction::RoundPlaces)
        );
        assert_eq!(BuiltinFunction::from_script_name("shout"), None);
    }
}
