use std::collections::HashMap;

use rayon::prelude::*;
use rowsift::dsl::Grammar;
use rowsift::{
    CompileError, Dynamic, EvalError, FilterExt, PredicateBuilder, Value, ValueKind,
    filter_sequence, impl_record,
};
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

struct Sample {
    name: String,
    number: i32,
    date: PrimitiveDateTime,
}

impl_record!(Sample {
    "Name" => name: String,
    "Number" => number: i32,
    "Date" => date: PrimitiveDateTime,
});

fn today() -> PrimitiveDateTime {
    OffsetDateTime::now_utc().date().midnight()
}

fn samples() -> Vec<Sample> {
    (0..8)
        .map(|i| Sample {
            name: format!("Name{i}"),
            number: i,
            date: today() + Duration::days(i64::from(i)),
        })
        .collect()
}

fn dynamic_samples() -> Vec<HashMap<String, Value>> {
    samples()
        .into_iter()
        .map(|sample| {
            HashMap::from([
                ("Name".to_string(), Value::String(sample.name)),
                ("Number".to_string(), Value::Int32(sample.number)),
                ("Date".to_string(), Value::DateTime(sample.date)),
            ])
        })
        .collect()
}

fn date_literal(days_from_today: i64) -> String {
    let date = (today() + Duration::days(days_from_today))
        .format(format_description!("[month]-[day]-[year]"))
        .unwrap();
    format!("#{date}#")
}

fn count_static(filter: &str) -> usize {
    samples()
        .into_iter()
        .filter_where::<Sample>(filter)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
        .len()
}

fn count_dynamic(filter: &str) -> usize {
    dynamic_samples()
        .into_iter()
        .filter_where::<dyn Dynamic>(filter)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
        .len()
}

#[test]
fn selects_by_string_equality() {
    let matched: Vec<String> = samples()
        .into_iter()
        .filter_where::<Sample>("[Name] == 'Name0'")
        .unwrap()
        .map(|sample| sample.unwrap().name)
        .collect();
    assert_eq!(matched, vec!["Name0"]);
    assert_eq!(count_dynamic("[Name] == 'Name0'"), 1);
}

#[test]
fn selects_by_integer_comparison() {
    let numbers: Vec<i32> = filter_sequence::<_, Sample>(samples(), "[Number] > 2")
        .unwrap()
        .map(|sample| sample.unwrap().number)
        .collect();
    assert_eq!(numbers, vec![3, 4, 5, 6, 7]);
    assert_eq!(count_dynamic("[Number] > 2"), 5);
}

#[test]
fn bare_less_than_includes_the_boundary() {
    let filter = format!("[Date] < {}", date_literal(3));
    assert_eq!(count_static(&filter), 4);
    assert_eq!(count_dynamic(&filter), 4);
}

#[test]
fn strict_grammar_excludes_the_boundary() {
    let filter = format!("[Date] < {}", date_literal(3));
    let predicate = PredicateBuilder::<Sample>::new()
        .grammar(Grammar::Strict)
        .build(&filter)
        .unwrap();
    let matched = samples()
        .iter()
        .filter(|sample| predicate.test(sample).unwrap())
        .count();
    assert_eq!(matched, 3);
}

#[test]
fn grouped_alternatives() {
    let filter = "([Name] == 'Name1') || ([Name] == 'Name2')";
    assert_eq!(count_static(filter), 2);
    assert_eq!(count_dynamic(filter), 2);
}

#[test]
fn negated_group() {
    let filter = "!([Number] >= 2)";
    assert_eq!(count_static(filter), 2);
    assert_eq!(count_dynamic(filter), 2);
}

#[test]
fn empty_filters_are_rejected() {
    for filter in ["", "   ", "\t\n"] {
        assert_eq!(
            PredicateBuilder::<Sample>::new().build(filter).unwrap_err(),
            CompileError::EmptyExpression
        );
        assert_eq!(
            PredicateBuilder::<dyn Dynamic>::new()
                .build(filter)
                .unwrap_err(),
            CompileError::EmptyExpression
        );
    }
}

#[test]
fn unknown_static_field_fails_at_build_time() {
    let result = samples()
        .into_iter()
        .filter_where::<Sample>("[Missing] == 1");
    assert_eq!(
        result.err(),
        Some(CompileError::UnknownField {
            name: "Missing".into()
        })
    );
}

#[test]
fn unknown_dynamic_member_fails_per_instance() {
    let predicate = PredicateBuilder::<dyn Dynamic>::new()
        .build("[Missing] == 1")
        .unwrap();
    let rows = dynamic_samples();
    for row in &rows {
        assert_eq!(
            predicate.test(row),
            Err(EvalError::UnresolvedMember {
                name: "Missing".into()
            })
        );
    }

    let mut with_member = rows[0].clone();
    with_member.insert("Missing".into(), Value::Int32(1));
    assert_eq!(predicate.test(&with_member), Ok(true));
}

#[test]
fn connectives_skip_the_right_operand_once_decided() {
    let row = HashMap::from([
        ("A".to_string(), Value::Int32(1)),
        ("S".to_string(), Value::String("text".into())),
    ]);
    let test = |filter: &str| {
        PredicateBuilder::<dyn Dynamic>::new()
            .build(filter)
            .unwrap()
            .test(&row)
    };

    assert_eq!(test("([A] == 1) || ([Missing] == 2)"), Ok(true));
    assert_eq!(test("([A] == 2) && ([Missing] == 2)"), Ok(false));
    assert_eq!(
        test("([A] == 2) || ([Missing] == 2)"),
        Err(EvalError::UnresolvedMember {
            name: "Missing".into()
        })
    );
}

#[test]
fn connectives_reject_non_boolean_members() {
    let row = HashMap::from([("S".to_string(), Value::String("text".into()))]);
    let predicate = PredicateBuilder::<dyn Dynamic>::new()
        .build("[S] && [S]")
        .unwrap();
    assert_eq!(
        predicate.test(&row),
        Err(EvalError::NotBoolean {
            found: Some(ValueKind::String)
        })
    );
}

#[test]
fn unrecognized_operator_is_reported() {
    assert_eq!(
        PredicateBuilder::<Sample>::new()
            .build("[Number] => 2")
            .unwrap_err(),
        CompileError::UnrecognizedOperator {
            symbol: "=>".into(),
            position: 9
        }
    );
}

#[test]
fn predicates_are_shared_across_threads() {
    let predicate = PredicateBuilder::<Sample>::new()
        .build("([Number] > 2) && ([Name] != 'Name5')")
        .unwrap();
    let samples = samples();

    let matched: usize = (0..64)
        .into_par_iter()
        .map(|_| {
            samples
                .par_iter()
                .filter(|sample| predicate.test(sample).unwrap())
                .count()
        })
        .sum();
    assert_eq!(matched, 64 * 4);
}

#[test]
fn json_objects_are_dynamic_targets() {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = (0..5)
        .map(|i| {
            serde_json::json!({ "Name": format!("Test{i}"), "Number": i })
                .as_object()
                .cloned()
                .unwrap()
        })
        .collect();

    let matched = rows
        .into_iter()
        .filter_where::<dyn Dynamic>("([Name] == 'Test1') || ([Number] == 4)")
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(matched.len(), 2);
}
