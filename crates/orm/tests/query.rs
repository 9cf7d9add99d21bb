mod common;

use common::*;
use loam_orm::{Comparator, FilterOp, ModelCrud, OrderDirection, Value};

#[tokio::test]
async fn comparison_filters_narrow_the_result_set() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let inner = Planet::query(&db)
        .where_lte("ordinal", 4)
        .count()
        .await
        .unwrap();
    assert_eq!(inner, 4);

    let not_earth = Planet::query(&db)
        .where_ne("name", "Earth")
        .count()
        .await
        .unwrap();
    assert_eq!(not_earth, 7);

    let explicit = Planet::query(&db)
        .filter("ordinal", Comparator::GreaterThan, 6)
        .count()
        .await
        .unwrap();
    assert_eq!(explicit, 2);
}

#[tokio::test]
async fn like_supports_wildcards() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let endings = Planet::query(&db)
        .where_like("name", "%us")
        .all()
        .await
        .unwrap();
    let names: Vec<&str> = endings.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Venus", "Uranus"]);

    let m_then_four = Planet::query(&db)
        .where_like("name", "M___")
        .count()
        .await
        .unwrap();
    assert_eq!(m_then_four, 1); // Mars
}

#[tokio::test]
async fn membership_filters_match_value_sets() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let picked = Planet::query(&db)
        .where_in(
            "name",
            vec![Value::from("Earth"), Value::from("Mars"), Value::from("Vulcan")],
        )
        .count()
        .await
        .unwrap();
    assert_eq!(picked, 2);

    let rest = Planet::query(&db)
        .where_not_in("name", vec![Value::from("Earth"), Value::from("Mars")])
        .count()
        .await
        .unwrap();
    assert_eq!(rest, 6);
}

#[tokio::test]
async fn equality_against_null_compiles_to_null_checks() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;
    Moon::create(&db, Moon::new("Wanderer", None)).await.unwrap();

    let rogue = Moon::query(&db)
        .where_eq("planet_id", Value::Null)
        .count()
        .await
        .unwrap();
    assert_eq!(rogue, 1);

    let attached = Moon::query(&db)
        .where_ne("planet_id", Value::Null)
        .count()
        .await
        .unwrap();
    assert_eq!(attached, 0);
}

#[tokio::test]
async fn or_groups_nest_inside_the_top_level_and_scope() {
    let TestDb { db, .. } = setup().await;
    let seeded = seed(&db).await;

    let picked = Planet::query(&db)
        .where_eq("star_id", seeded.sun.id.unwrap())
        .group(FilterOp::Or, |g| {
            g.where_eq("name", "Earth")
                .where_eq("name", "Neptune")
                .where_gt("ordinal", 100)
        })
        .all()
        .await
        .unwrap();
    let names: Vec<&str> = picked.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Earth", "Neptune"]);
}

#[tokio::test]
async fn field_to_field_comparisons() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    // ordinal < id never holds while ids mirror insertion order starting at 1
    let none = Planet::query(&db)
        .where_field("ordinal", Comparator::GreaterThan, "id")
        .count()
        .await
        .unwrap();
    assert_eq!(none, 0);

    let all = Planet::query(&db)
        .where_field("ordinal", Comparator::Equal, "id")
        .count()
        .await
        .unwrap();
    assert_eq!(all, 8);
}

#[tokio::test]
async fn sorting_and_ranges_shape_the_window() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let outermost = Planet::query(&db)
        .order_by("ordinal", OrderDirection::Desc)
        .limit(2)
        .all()
        .await
        .unwrap();
    let names: Vec<&str> = outermost.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Neptune", "Uranus"]);

    let third_alphabetically = Planet::query(&db)
        .order_by_asc("name")
        .offset(2)
        .limit(1)
        .first()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(third_alphabetically.name, "Mars");
}

#[tokio::test]
async fn aggregates_over_matching_rows() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let sum = Planet::query(&db).sum("ordinal").await.unwrap();
    assert_eq!(sum, Value::Int(36));

    let min = Planet::query(&db)
        .where_gt("ordinal", 5)
        .min("ordinal")
        .await
        .unwrap();
    assert_eq!(min, Value::Int(6));

    let max = Planet::query(&db).max("name").await.unwrap();
    assert_eq!(max, Value::from("Venus"));

    let average = Planet::query(&db).average("ordinal").await.unwrap();
    assert_eq!(average, Value::Float(4.5));

    // Aggregates over an empty match are Null, count is zero
    let empty = Planet::query(&db)
        .where_gt("ordinal", 100)
        .sum("ordinal")
        .await
        .unwrap();
    assert_eq!(empty, Value::Null);
    let zero = Planet::query(&db)
        .where_gt("ordinal", 100)
        .count()
        .await
        .unwrap();
    assert_eq!(zero, 0);
}

#[tokio::test]
async fn paginate_returns_items_and_total_together() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let page = Planet::query(&db)
        .order_by_asc("ordinal")
        .paginate(2, 3)
        .await
        .unwrap();
    assert_eq!(page.total, 8);
    assert_eq!(page.page, 2);
    assert_eq!(page.per_page, 3);
    assert_eq!(page.page_count(), 3);
    let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Mars", "Jupiter", "Saturn"]);
}

#[tokio::test]
async fn paginate_clamps_degenerate_inputs() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let page = Planet::query(&db).paginate(-3, -5).await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.per_page, 0);
    assert!(page.items.is_empty());
    assert_eq!(page.total, 8);
    assert_eq!(page.page_count(), 0);

    let past_the_end = Planet::query(&db)
        .order_by_asc("ordinal")
        .paginate(9, 5)
        .await
        .unwrap();
    assert!(past_the_end.items.is_empty());
    assert_eq!(past_the_end.total, 8);
}

#[tokio::test]
async fn chunk_walks_the_full_set_in_order() {
    let TestDb { db, .. } = setup().await;
    seed(&db).await;

    let mut chunks: Vec<usize> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    Planet::query(&db)
        .order_by_asc("ordinal")
        .chunk(3, |batch| {
            chunks.push(batch.len());
            seen.extend(batch.into_iter().map(|p| p.name));
            async { Ok(()) }
        })
        .await
        .unwrap();

    assert_eq!(chunks, vec![3, 3, 2]);
    assert_eq!(seen.first().map(String::as_str), Some("Mercury"));
    assert_eq!(seen.last().map(String::as_str), Some("Neptune"));
}

#[tokio::test]
async fn group_by_partitions_aggregates() {
    use loam_orm::{Aggregate, FieldRef, Query, QueryAction};

    let TestDb { db, .. } = setup().await;
    let seeded = seed(&db).await;
    let alpha_id = seeded.alpha_centauri.id.unwrap();
    Planet::create(&db, Planet::new("Proxima b", alpha_id, 1))
        .await
        .unwrap();

    let mut query = Query::new("planets", QueryAction::Aggregate(Aggregate::Count));
    query.groups = vec![FieldRef::new("star_id")];
    let rows = db.execute(query).await.unwrap();

    assert_eq!(rows.len(), 2);
    let sun_row = rows
        .iter()
        .find(|r| r.get("star_id") == Some(&Value::Int(seeded.sun.id.unwrap())))
        .unwrap();
    assert_eq!(sun_row.get("count"), Some(&Value::Int(8)));
    let alpha_row = rows
        .iter()
        .find(|r| r.get("star_id") == Some(&Value::Int(alpha_id)))
        .unwrap();
    assert_eq!(alpha_row.get("count"), Some(&Value::Int(1)));
}
