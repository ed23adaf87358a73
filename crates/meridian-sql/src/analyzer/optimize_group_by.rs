//! GROUP BY simplification.
//!
//! Grouping by `f(x)` where `f` is injective groups exactly like grouping by
//! `x`, so the call is unwrapped and its non-literal arguments promoted into
//! the key list. Constant literals never affect grouping and are dropped.
//!
//! Injectivity comes from a fixed list of function names, plus `dictGet*`
//! calls whose dictionary attribute the dictionary metadata reports as
//! injective. A `dictGet*` with fewer than two arguments or a non-literal
//! dictionary/attribute name is left untouched; semantic errors are not
//! this pass's business.
//!
//! GROUP BY cannot simply disappear: with a HAVING clause and no keys there
//! would be no aggregation at all. An emptied (or absent-but-needed) key
//! list is replaced by a constant key that is not the name of any source
//! column, so aggregation still happens.

use std::collections::HashSet;

use crate::dictionaries::InjectivityCache;
use crate::expressions::{Expression, Literal, SelectQuery, Value};

const INJECTIVE_FUNCTIONS: &[&str] = &[
    "negate",
    "bitNot",
    "reverse",
    "reverseUTF8",
    "toString",
    "toFixedString",
    "IPv4NumToString",
    "IPv4StringToNum",
    "hex",
    "unhex",
    "bitmaskToList",
    "bitmaskToArray",
    "tuple",
    "regionToName",
    "concatAssumeInjective",
];

const POSSIBLY_INJECTIVE_FUNCTIONS: &[&str] = &[
    "dictGetString",
    "dictGetUInt8",
    "dictGetUInt16",
    "dictGetUInt32",
    "dictGetUInt64",
    "dictGetInt8",
    "dictGetInt16",
    "dictGetInt32",
    "dictGetInt64",
    "dictGetFloat32",
    "dictGetFloat64",
    "dictGetDate",
    "dictGetDateTime",
];

/// Eliminate injective function calls and constants from GROUP BY.
pub fn optimize_group_by(
    query: &mut SelectQuery,
    source_columns: &HashSet<String>,
    dictionaries: Option<&InjectivityCache<'_>>,
) {
    let Some(group_exprs) = &mut query.group_by else {
        // a HAVING clause without GROUP BY still needs aggregation to happen
        if query.having.is_some() {
            query.group_by = Some(vec![unused_group_by_column(source_columns)]);
        }
        return;
    };

    let mut i = 0;
    while i < group_exprs.len() {
        let unwrap_args = match &group_exprs[i] {
            Expression::Function(function) => {
                if POSSIBLY_INJECTIVE_FUNCTIONS.contains(&function.name.as_str()) {
                    if !dict_call_is_injective(function.as_ref(), dictionaries) {
                        i += 1;
                        continue;
                    }
                    Some(function.args.clone())
                } else if INJECTIVE_FUNCTIONS.contains(&function.name.as_str()) {
                    Some(function.args.clone())
                } else {
                    None
                }
            }
            Expression::Literal(_) => Some(Vec::new()),
            _ => None,
        };

        match unwrap_args {
            Some(args) => {
                // swap-remove keeps the scan position valid; promoted
                // arguments land at the end and are revisited
                let last = group_exprs.len() - 1;
                group_exprs.swap(i, last);
                group_exprs.pop();
                group_exprs.extend(args.into_iter().filter(|arg| !arg.is_literal()));
            }
            None => i += 1,
        }
    }

    if group_exprs.is_empty() {
        *group_exprs = vec![unused_group_by_column(source_columns)];
    }
}

fn dict_call_is_injective(
    function: &crate::expressions::Function,
    dictionaries: Option<&InjectivityCache<'_>>,
) -> bool {
    if function.args.len() < 2 {
        return false;
    }
    let Some(dictionaries) = dictionaries else {
        return false;
    };
    let dictionary = function.args[0].as_literal().and_then(|l| l.value.as_str());
    let attribute = function.args[1].as_literal().and_then(|l| l.value.as_str());
    match (dictionary, attribute) {
        (Some(dictionary), Some(attribute)) => dictionaries.is_injective(dictionary, attribute),
        _ => false,
    }
}

/// A constant key whose text is not the name of a source column. Such a
/// collision is rare, but it happens.
fn unused_group_by_column(source_columns: &HashSet<String>) -> Expression {
    let mut unused: u64 = 0;
    while source_columns.contains(&unused.to_string()) {
        unused += 1;
    }
    Expression::Literal(Literal::new(Value::UInt64(unused)))
}
