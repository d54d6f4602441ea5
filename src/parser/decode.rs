//! Decoders for scalar fields the gamedata export encodes inconsistently.
//!
//! The same field may arrive as an integer, a digit string, or a symbolic tag
//! depending on the export version. Each field gets a small closed enum and
//! decoding never fails: anything unrecognized (including an absent value)
//! collapses to the field's documented default.

use serde_json::Value;
use tracing::debug;

/// Storage ceiling for duration-like fields
pub const DURATION_CEILING: f64 = 999.0;

/// A source encoding of one canonical integer field
pub trait SourceCode: Sized {
    /// Field name used in debug logs
    const FIELD: &'static str;
    /// Canonical value for unrecognized or absent input
    const DEFAULT: i64;

    /// Recognize one encoding form, `None` if the value matches none
    fn parse(value: &Value) -> Option<Self>;

    fn canonical(&self) -> i64;

    /// Canonical form back to the symbolic source form, where one exists
    fn encode(canonical: i64) -> Option<Self>;

    /// Source-side JSON for this code
    fn to_source(&self) -> Value;
}

/// Decode a possibly-absent source value to its canonical integer
pub fn decode<C: SourceCode>(value: Option<&Value>) -> i64 {
    match value {
        None | Some(Value::Null) => C::DEFAULT,
        Some(v) => match C::parse(v) {
            Some(code) => code.canonical(),
            None => {
                debug!(field = C::FIELD, value = %v, "unrecognized encoding, using default");
                C::DEFAULT
            }
        },
    }
}

pub fn decode_rarity(value: Option<&Value>) -> i64 {
    decode::<RarityCode>(value)
}

pub fn decode_phase(value: Option<&Value>) -> i64 {
    decode::<PhaseCode>(value)
}

pub fn decode_skill_type(value: Option<&Value>) -> i64 {
    decode::<SkillTypeCode>(value)
}

pub fn decode_sp_type(value: Option<&Value>) -> i64 {
    decode::<SpTypeCode>(value)
}

/// Clamp a duration to the store's precision ceiling. Lossy on purpose.
pub fn clamp_duration(value: f64) -> f64 {
    value.min(DURATION_CEILING)
}

/// Plain integers and unsigned digit strings
fn plain_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => digits(s),
        _ => None,
    }
}

fn digits(s: &str) -> Option<i64> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

fn tagged(value: &Value, prefix: &str) -> Option<i64> {
    value.as_str()?.strip_prefix(prefix).and_then(digits)
}

// =============================================================================
// Rarity
// =============================================================================

/// Rarity is 0-based in the store; `TIER_<n>` tags are 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RarityCode {
    Index(i64),
    Tier(i64),
}

impl RarityCode {
    pub const MAX_TIER: i64 = 6;
}

impl SourceCode for RarityCode {
    const FIELD: &'static str = "rarity";
    const DEFAULT: i64 = 0;

    fn parse(value: &Value) -> Option<Self> {
        if let Some(tier) = tagged(value, "TIER_") {
            return (1..=Self::MAX_TIER)
                .contains(&tier)
                .then_some(RarityCode::Tier(tier));
        }
        plain_integer(value).map(RarityCode::Index)
    }

    fn canonical(&self) -> i64 {
        match *self {
            RarityCode::Index(n) => n,
            RarityCode::Tier(n) => n - 1,
        }
    }

    fn encode(canonical: i64) -> Option<Self> {
        let tier = canonical + 1;
        (1..=Self::MAX_TIER)
            .contains(&tier)
            .then_some(RarityCode::Tier(tier))
    }

    fn to_source(&self) -> Value {
        match *self {
            RarityCode::Index(n) => Value::from(n),
            RarityCode::Tier(n) => Value::from(format!("TIER_{}", n)),
        }
    }
}

// =============================================================================
// Promotion phase
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCode {
    Index(i64),
    Tagged(i64),
}

impl SourceCode for PhaseCode {
    const FIELD: &'static str = "phase";
    const DEFAULT: i64 = 0;

    fn parse(value: &Value) -> Option<Self> {
        tagged(value, "PHASE_")
            .map(PhaseCode::Tagged)
            .or_else(|| plain_integer(value).map(PhaseCode::Index))
    }

    fn canonical(&self) -> i64 {
        match *self {
            PhaseCode::Index(n) | PhaseCode::Tagged(n) => n,
        }
    }

    fn encode(canonical: i64) -> Option<Self> {
        (canonical >= 0).then_some(PhaseCode::Tagged(canonical))
    }

    fn to_source(&self) -> Value {
        match *self {
            PhaseCode::Index(n) => Value::from(n),
            PhaseCode::Tagged(n) => Value::from(format!("PHASE_{}", n)),
        }
    }
}

// =============================================================================
// Skill activation mode
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillTypeCode {
    Raw(i64),
    Passive,
    Manual,
    Auto,
}

impl SourceCode for SkillTypeCode {
    const FIELD: &'static str = "skillType";
    const DEFAULT: i64 = 0;

    fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(SkillTypeCode::Raw),
            Value::String(s) => match s.as_str() {
                "PASSIVE" => Some(SkillTypeCode::Passive),
                "MANUAL" => Some(SkillTypeCode::Manual),
                "AUTO" => Some(SkillTypeCode::Auto),
                _ => None,
            },
            _ => None,
        }
    }

    fn canonical(&self) -> i64 {
        match *self {
            SkillTypeCode::Raw(n) => n,
            SkillTypeCode::Passive => 0,
            SkillTypeCode::Manual => 1,
            SkillTypeCode::Auto => 2,
        }
    }

    fn encode(canonical: i64) -> Option<Self> {
        match canonical {
            0 => Some(SkillTypeCode::Passive),
            1 => Some(SkillTypeCode::Manual),
            2 => Some(SkillTypeCode::Auto),
            _ => None,
        }
    }

    fn to_source(&self) -> Value {
        match *self {
            SkillTypeCode::Raw(n) => Value::from(n),
            SkillTypeCode::Passive => Value::from("PASSIVE"),
            SkillTypeCode::Manual => Value::from("MANUAL"),
            SkillTypeCode::Auto => Value::from("AUTO"),
        }
    }
}

// =============================================================================
// SP gain mode (bit flags)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpTypeCode {
    Raw(i64),
    OverTime,
    OnAttack,
    OnDamageTaken,
}

impl SpTypeCode {
    /// Reserved "other" flag
    pub const OTHER: i64 = 8;
}

impl SourceCode for SpTypeCode {
    const FIELD: &'static str = "spType";
    const DEFAULT: i64 = SpTypeCode::OTHER;

    fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(SpTypeCode::Raw),
            Value::String(s) => match s.as_str() {
                "INCREASE_WITH_TIME" => Some(SpTypeCode::OverTime),
                "INCREASE_WHEN_ATTACK" => Some(SpTypeCode::OnAttack),
                "INCREASE_WHEN_TAKEN_DAMAGE" => Some(SpTypeCode::OnDamageTaken),
                _ => None,
            },
            _ => None,
        }
    }

    fn canonical(&self) -> i64 {
        match *self {
            SpTypeCode::Raw(n) => n,
            SpTypeCode::OverTime => 1,
            SpTypeCode::OnAttack => 2,
            SpTypeCode::OnDamageTaken => 4,
        }
    }

    fn encode(canonical: i64) -> Option<Self> {
        match canonical {
            1 => Some(SpTypeCode::OverTime),
            2 => Some(SpTypeCode::OnAttack),
            4 => Some(SpTypeCode::OnDamageTaken),
            _ => None,
        }
    }

    fn to_source(&self) -> Value {
        match *self {
            SpTypeCode::Raw(n) => Value::from(n),
            SpTypeCode::OverTime => Value::from("INCREASE_WITH_TIME"),
            SpTypeCode::OnAttack => Value::from("INCREASE_WHEN_ATTACK"),
            SpTypeCode::OnDamageTaken => Value::from("INCREASE_WHEN_TAKEN_DAMAGE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn round_trip<C: SourceCode>(canonical: i64) -> i64 {
        let code = C::encode(canonical).expect("inverse defined");
        decode::<C>(Some(&code.to_source()))
    }

    #[test]
    fn test_rarity_forms() {
        assert_eq!(decode_rarity(Some(&json!(4))), 4);
        assert_eq!(decode_rarity(Some(&json!("3"))), 3);
        assert_eq!(decode_rarity(Some(&json!("TIER_3"))), 2);
        assert_eq!(decode_rarity(Some(&json!("TIER_6"))), 5);
        assert_eq!(decode_rarity(Some(&json!("TIER_1"))), 0);
    }

    #[test]
    fn test_rarity_defaults() {
        assert_eq!(decode_rarity(None), 0);
        assert_eq!(decode_rarity(Some(&Value::Null)), 0);
        assert_eq!(decode_rarity(Some(&json!("TIER_0"))), 0);
        assert_eq!(decode_rarity(Some(&json!("TIER_X"))), 0);
        assert_eq!(decode_rarity(Some(&json!("-2"))), 0);
        assert_eq!(decode_rarity(Some(&json!(2.5))), 0);
        assert_eq!(decode_rarity(Some(&json!({"tier": 3}))), 0);
    }

    #[test]
    fn test_phase_forms() {
        assert_eq!(decode_phase(Some(&json!(2))), 2);
        assert_eq!(decode_phase(Some(&json!("1"))), 1);
        assert_eq!(decode_phase(Some(&json!("PHASE_2"))), 2);
        assert_eq!(decode_phase(Some(&json!("PHASE_"))), 0);
        assert_eq!(decode_phase(Some(&json!("ELITE_2"))), 0);
        assert_eq!(decode_phase(None), 0);
    }

    #[test]
    fn test_skill_type_forms() {
        assert_eq!(decode_skill_type(Some(&json!("PASSIVE"))), 0);
        assert_eq!(decode_skill_type(Some(&json!("MANUAL"))), 1);
        assert_eq!(decode_skill_type(Some(&json!("AUTO"))), 2);
        assert_eq!(decode_skill_type(Some(&json!(1))), 1);
        assert_eq!(decode_skill_type(Some(&json!("manual"))), 0);
        assert_eq!(decode_skill_type(None), 0);
    }

    #[test]
    fn test_sp_type_forms() {
        assert_eq!(decode_sp_type(Some(&json!("INCREASE_WITH_TIME"))), 1);
        assert_eq!(decode_sp_type(Some(&json!("INCREASE_WHEN_ATTACK"))), 2);
        assert_eq!(decode_sp_type(Some(&json!("INCREASE_WHEN_TAKEN_DAMAGE"))), 4);
        assert_eq!(decode_sp_type(Some(&json!(8))), 8);
        assert_eq!(decode_sp_type(Some(&json!("UNKNOWN"))), 8);
        assert_eq!(decode_sp_type(Some(&json!([1]))), 8);
        assert_eq!(decode_sp_type(None), 8);
    }

    #[test]
    fn test_clamp_duration() {
        assert_eq!(clamp_duration(1500.5), 999.0);
        assert_eq!(clamp_duration(10.25), 10.25);
        assert_eq!(clamp_duration(999.0), 999.0);
        assert_eq!(clamp_duration(-1.0), -1.0);
    }

    #[test]
    fn test_symbolic_round_trips() {
        for rarity in 0..=5 {
            assert_eq!(round_trip::<RarityCode>(rarity), rarity);
        }
        for phase in 0..=2 {
            assert_eq!(round_trip::<PhaseCode>(phase), phase);
        }
        for skill_type in 0..=2 {
            assert_eq!(round_trip::<SkillTypeCode>(skill_type), skill_type);
        }
        for sp_type in [1, 2, 4] {
            assert_eq!(round_trip::<SpTypeCode>(sp_type), sp_type);
        }
    }

    proptest! {
        #[test]
        fn prop_unrecognized_strings_use_defaults(s in "[a-z ]{0,12}") {
            let v = Value::from(s);
            prop_assert_eq!(decode_rarity(Some(&v)), 0);
            prop_assert_eq!(decode_phase(Some(&v)), 0);
            prop_assert_eq!(decode_skill_type(Some(&v)), 0);
            prop_assert_eq!(decode_sp_type(Some(&v)), 8);
        }

        #[test]
        fn prop_digit_strings_match_integers(n in 0i64..1_000_000) {
            let as_int = Value::from(n);
            let as_text = Value::from(n.to_string());
            prop_assert_eq!(decode_rarity(Some(&as_int)), decode_rarity(Some(&as_text)));
            prop_assert_eq!(decode_phase(Some(&as_int)), decode_phase(Some(&as_text)));
        }

        #[test]
        fn prop_tier_tags_are_one_based(tier in 1i64..=6) {
            let tag = Value::from(format!("TIER_{}", tier));
            prop_assert_eq!(decode_rarity(Some(&tag)), tier - 1);
        }

        #[test]
        fn prop_clamp_never_exceeds_ceiling(x in -1.0e6f64..1.0e6) {
            let clamped = clamp_duration(x);
            prop_assert!(clamped <= DURATION_CEILING);
            if x <= DURATION_CEILING {
                prop_assert_eq!(clamped, x);
            }
        }
    }
}
