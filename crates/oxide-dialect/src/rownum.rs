//! Row-number wrapping shared by the dialects that page through a
//! synthetic `ROW_NUMBER()` column.

/// Alias of the derived table holding the original statement.
pub const INNER_ALIAS: &str = "inner_";

/// Alias of the derived table carrying the row number.
pub const OUTER_ALIAS: &str = "outer_";

/// Name of the synthetic row-number column.
pub const ROW_NUMBER_COLUMN: &str = "rownumber_";

/// Filter applied to the synthetic row number (numbers start at 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRange {
    /// `rownumber_ > n`
    After(usize),
    /// `rownumber_ BETWEEN low AND high`, both ends inclusive.
    Between(usize, usize),
}

impl RowRange {
    fn predicate(self) -> String {
        match self {
            Self::After(n) => format!("{ROW_NUMBER_COLUMN} > {n}"),
            Self::Between(low, high) => {
                format!("{ROW_NUMBER_COLUMN} BETWEEN {low} AND {high}")
            }
        }
    }
}

/// Wraps `body` in an outer query numbering its rows with
/// `ROW_NUMBER() OVER (<over>)` and keeping only `range`.
#[must_use]
pub fn wrap(body: &str, over: &str, range: RowRange) -> String {
    format!(
        "SELECT * FROM ( SELECT {INNER_ALIAS}.*, ROW_NUMBER() OVER ({over}) AS {ROW_NUMBER_COLUMN} \
         FROM ( {body} ) AS {INNER_ALIAS} ) AS {OUTER_ALIAS} WHERE {}",
        range.predicate()
    )
}
