use sqlx::{Pool, Postgres};

use crate::{
    error::Error,
    schema::{Id, ShoppingListItem},
};

/// Ingredient totals over every recipe in the user's cart, one line per
/// `(name, measurement_unit)` pair.
pub async fn shopping_list(user_id: Id, pool: &Pool<Postgres>) -> Result<Vec<ShoppingListItem>, Error> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit,
            SUM(ri.amount)::BIGINT AS amount
        FROM cart_items c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Plain text body of the downloaded list, `name: amountunit` per line.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}: {}{}\n", item.name, item.amount, item.measurement_unit))
        .collect()
}
