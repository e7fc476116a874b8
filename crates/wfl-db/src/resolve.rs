//! Shelf/TL resolution: which TL is active for a shelf, which shelf to work
//! next, and the natural-ordered shelf sequence used for round-robin
//! advancement.

use std::cmp::Ordering;

use sqlx::SqlitePool;

use crate::error::Result;

/// The TL that is active for a shelf: highest row-count wins, ties broken by
/// the most-recently-inserted row of the TL. When no TL on the shelf has
/// more than one row this degenerates to the most recent TL-bearing row,
/// which is what a freshly started shelf needs.
pub async fn tl_for_shelf(pool: &SqlitePool, shelf: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        select tl_id
        from ledger
        where shelf = ? and ifnull(tl_id, '') <> ''
        group by tl_id
        order by count(*) desc, max(rowid) desc
        limit 1
        "#,
    )
    .bind(shelf)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(tl,)| tl))
}

/// Shelf of the earliest-inserted rows (grouped case-insensitively) whose
/// `pick` is still empty. `None` once everything is picked.
pub async fn next_unpicked_shelf(pool: &SqlitePool) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        select shelf
        from ledger
        where ifnull(pick, '') = '' and ifnull(shelf, '') <> ''
        group by lower(shelf)
        order by min(rowid) asc
        limit 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(s,)| s))
}

/// Distinct non-empty shelves in natural ascending order (numeric-aware,
/// case-insensitive): `A2` sorts before `A10`.
pub async fn distinct_shelves_sorted(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("select distinct shelf from ledger where ifnull(shelf, '') <> ''")
            .fetch_all(pool)
            .await?;

    let mut shelves: Vec<String> = rows.into_iter().map(|(s,)| s).collect();
    shelves.sort_by(|a, b| natural_cmp(a, b));
    Ok(shelves)
}

/// Head of [`distinct_shelves_sorted`]; the seed for the suggested shelf.
pub async fn first_shelf_sorted(pool: &SqlitePool) -> Result<Option<String>> {
    Ok(distinct_shelves_sorted(pool).await?.into_iter().next())
}

/// Numeric-aware, case-insensitive ordering. Runs of digits compare by
/// value (then by run length so `007` > `07`); everything else compares
/// case-folded per character.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ax = a.chars().peekable();
    let mut bx = b.chars().peekable();

    loop {
        match (ax.peek().copied(), bx.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let (va, la) = take_number(&mut ax);
                    let (vb, lb) = take_number(&mut bx);
                    match va.cmp(&vb).then(la.cmp(&lb)) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }

                let fa = ca.to_ascii_lowercase();
                let fb = cb.to_ascii_lowercase();
                if fa != fb {
                    return fa.cmp(&fb);
                }
                ax.next();
                bx.next();
            }
        }
    }
}

fn take_number(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> (u128, usize) {
    let mut value: u128 = 0;
    let mut len = 0usize;
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        // Saturate rather than wrap on absurdly long digit runs.
        value = value
            .saturating_mul(10)
            .saturating_add((c as u8 - b'0') as u128);
        len += 1;
        it.next();
    }
    (value, len)
}
