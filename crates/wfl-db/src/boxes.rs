//! Box allocation: which box to pick next for a TL+shelf pair, and the
//! assignment of freshly generated box ids onto rows that lack one.

use sqlx::SqlitePool;

use crate::error::Result;

/// A row that just received a box id, with the route fields the label
/// collaborator needs for the stamp request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedBox {
    pub box_id: String,
    pub stn: String,
    pub source: Option<String>,
    pub destination: Option<String>,
}

/// The box to pick next for `tl` + `shelf`, in tiers:
///
/// 1. earliest-inserted row with empty `pick` and a non-empty `box_id`;
/// 2. latest-inserted row with *any* non-empty `box_id` for the pair;
/// 3. latest non-empty `box_id` for the TL alone, ignoring shelf.
///
/// The later tiers exist because a box can already be fully picked on this
/// shelf while still being the one physically open on the cart.
pub async fn next_unpicked_box_for_tl_shelf(
    pool: &SqlitePool,
    tl: &str,
    shelf: &str,
) -> Result<Option<String>> {
    let preferred: Option<(String,)> = sqlx::query_as(
        r#"
        select box_id
        from ledger
        where tl_id = ? and shelf = ?
          and ifnull(pick, '') = '' and ifnull(box_id, '') <> ''
        order by rowid asc
        limit 1
        "#,
    )
    .bind(tl)
    .bind(shelf)
    .fetch_optional(pool)
    .await?;

    if let Some((b,)) = preferred {
        return Ok(Some(b));
    }

    let any_for_pair: Option<(String,)> = sqlx::query_as(
        r#"
        select box_id
        from ledger
        where tl_id = ? and shelf = ? and ifnull(box_id, '') <> ''
        order by rowid desc
        limit 1
        "#,
    )
    .bind(tl)
    .bind(shelf)
    .fetch_optional(pool)
    .await?;

    if let Some((b,)) = any_for_pair {
        return Ok(Some(b));
    }

    let any_for_tl: Option<(String,)> = sqlx::query_as(
        r#"
        select box_id
        from ledger
        where tl_id = ? and ifnull(box_id, '') <> ''
        order by rowid desc
        limit 1
        "#,
    )
    .bind(tl)
    .fetch_optional(pool)
    .await?;

    Ok(any_for_tl.map(|(b,)| b))
}

/// Assign freshly generated box ids to rows lacking one: eligible rows are
/// taken first in `stn_list` order, then by insertion order, consuming at
/// most `box_ids.len()` rows — one id per row, in order.
///
/// A shortfall (fewer eligible rows than ids) is logged, never an error;
/// the returned vector's length is the count actually assigned.
pub async fn assign_box_ids_to_stns(
    pool: &SqlitePool,
    box_ids: &[String],
    stn_list: &[String],
) -> Result<Vec<AssignedBox>> {
    let mut tx = pool.begin().await?;
    let mut assigned: Vec<AssignedBox> = Vec::new();
    let mut ids = box_ids.iter();

    'stns: for stn in stn_list {
        let rows: Vec<(i64, String, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            select rowid, stn, source, destination
            from ledger
            where stn = ? and ifnull(box_id, '') = ''
            order by rowid asc
            "#,
        )
        .bind(stn)
        .fetch_all(&mut *tx)
        .await?;

        for (rowid, stn, source, destination) in rows {
            let Some(box_id) = ids.next() else {
                break 'stns;
            };

            sqlx::query("update ledger set box_id = ? where rowid = ?")
                .bind(box_id)
                .bind(rowid)
                .execute(&mut *tx)
                .await?;

            assigned.push(AssignedBox {
                box_id: box_id.clone(),
                stn,
                source,
                destination,
            });
        }
    }

    tx.commit().await?;

    if assigned.len() < box_ids.len() {
        tracing::warn!(
            generated = box_ids.len(),
            assigned = assigned.len(),
            "fewer eligible rows than generated box ids; surplus ids unused"
        );
    }

    Ok(assigned)
}
