use anyhow::Result;
use serde_json::{json, Value};
use ted_insights::constants::ANALYTICS_COLLECTION;
use ted_insights::domain::{CpvDivision, IsoCountry};
use ted_insights::engine::Document;
use ted_insights::queries::*;
use ted_insights::{reference, DocumentStore, InMemoryStore};

const DAY_MS: i64 = 86_400_000;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn date(days: i64) -> Value {
    json!({ "$date": days * DAY_MS })
}

async fn seeded_store() -> Result<InMemoryStore> {
    let store = InMemoryStore::new();
    let mut contracts = vec![
        doc(json!({
            "CPV": "45000000", "CPV_DIVISION": "45", "ISO_COUNTRY_CODE": "PT", "YEAR": 2015,
            "VALUE_EURO": 100, "AWARD_VALUE_EURO": 150, "NUMBER_OFFERS": 2, "B_EU_FUNDS": "Y",
            "CAE_NAME": "Lisboa", "WIN_NAME": "Acme", "PAIR": "Lisboa with Acme",
            "ADDRESS": "Rua 1 Lisboa", "DT_DISPATCH": date(10), "DT_AWARD": date(0)
        })),
        doc(json!({
            "CPV": "45200000", "CPV_DIVISION": "45", "ISO_COUNTRY_CODE": "ES", "YEAR": 2016,
            "VALUE_EURO": 300, "AWARD_VALUE_EURO": 280, "NUMBER_OFFERS": 4, "B_EU_FUNDS": "N",
            "CAE_NAME": "Madrid", "WIN_NAME": "Acme", "PAIR": "Madrid with Acme",
            "ADDRESS": "Calle 2 Madrid", "DT_DISPATCH": date(4), "DT_AWARD": date(0)
        })),
        doc(json!({
            "CPV": "50100000", "CPV_DIVISION": "50", "ISO_COUNTRY_CODE": "PT", "YEAR": 2017,
            "VALUE_EURO": 50, "NUMBER_OFFERS": 1, "B_EU_FUNDS": "Y",
            "CAE_NAME": "Lisboa", "WIN_NAME": "Acme", "PAIR": "Lisboa with Acme",
            "ADDRESS": "Rua 1 Lisboa", "DT_DISPATCH": null, "DT_AWARD": null
        })),
        doc(json!({
            "CPV": "50800000", "CPV_DIVISION": "50", "ISO_COUNTRY_CODE": "PT", "YEAR": 2018,
            "VALUE_EURO": 250000, "AWARD_VALUE_EURO": 250000, "NUMBER_OFFERS": 3, "B_EU_FUNDS": "N",
            "CAE_NAME": "Porto", "WIN_NAME": "Beta", "PAIR": "Porto with Beta",
            "ADDRESS": "Av 3 Porto", "DT_DISPATCH": date(2), "DT_AWARD": date(0)
        })),
        doc(json!({
            "CPV": "33100000", "CPV_DIVISION": "33", "ISO_COUNTRY_CODE": "ES", "YEAR": 2019,
            "VALUE_EURO": 2000000, "AWARD_VALUE_EURO": 1900000, "NUMBER_OFFERS": 5, "B_EU_FUNDS": "Y",
            "CAE_NAME": "Madrid", "WIN_NAME": "Gamma", "PAIR": "Madrid with Gamma",
            "ADDRESS": "Calle 2 Madrid"
        })),
        doc(json!({
            "CPV": "45000000", "CPV_DIVISION": "45", "ISO_COUNTRY_CODE": "PT", "YEAR": 2005,
            "VALUE_EURO": 999, "B_EU_FUNDS": "Y", "CAE_NAME": "Lisboa"
        })),
        doc(json!({
            "CPV": null, "CPV_DIVISION": "", "ISO_COUNTRY_CODE": "FR", "YEAR": 2015,
            "VALUE_EURO": 10, "B_EU_FUNDS": "N"
        })),
    ];
    store.insert_many(ANALYTICS_COLLECTION, &mut contracts).await?;

    let divisions = [
        ("45", "Construction work"),
        ("50", "Repair and maintenance services"),
        ("33", "Medical equipments"),
    ]
    .map(|(code, description)| CpvDivision {
        cpv_division: code.to_string(),
        cpv_division_description: description.to_string(),
    });
    reference::load_cpv_divisions(&store, &divisions).await?;

    let countries = [("Portugal", "PT", "PRT"), ("Spain", "ES", "ESP"), ("France", "FR", "FRA")].map(
        |(name, alpha_2, alpha_3)| IsoCountry {
            name: name.to_string(),
            alpha_2: alpha_2.to_string(),
            alpha_3: alpha_3.to_string(),
        },
    );
    reference::load_iso_countries(&store, &countries).await?;
    Ok(store)
}

fn cpv_names(rows: &[CpvAverage]) -> Vec<&str> {
    rows.iter().filter_map(|row| row.cpv.as_deref()).collect()
}

#[tokio::test]
async fn count_example_respects_years_and_ceiling() -> Result<()> {
    let store = seeded_store().await?;
    let filter = QueryFilter::default();

    assert_eq!(count_example(&store, &filter, 100_000_000.0).await?, Some(6));
    assert_eq!(count_example(&store, &filter, 1_000.0).await?, Some(4));
    assert_eq!(count_example(&store, &filter, 1.0).await?, None);
    Ok(())
}

#[tokio::test]
async fn box_summaries_average_per_group_then_truncate() -> Result<()> {
    let store = seeded_store().await?;
    let filter = QueryFilter::default();

    assert_eq!(
        cpv_box(&store, &filter).await?,
        BoxSummary {
            avg_value: Some(708_408),
            avg_count: Some(1),
            avg_offers: Some(3),
            avg_value_eu_funded: Some(666_716),
            avg_value_not_eu_funded: Some(125_150),
        }
    );
    assert_eq!(
        country_box(&store, &filter).await?,
        BoxSummary {
            avg_value: Some(361_181),
            avg_count: Some(2),
            avg_offers: Some(3),
            avg_value_eu_funded: Some(1_000_037),
            avg_value_not_eu_funded: Some(83_436),
        }
    );
    assert_eq!(
        business_box(&store, &filter).await?,
        BoxSummary {
            avg_value: Some(416_741),
            avg_count: Some(1),
            avg_offers: Some(3),
            avg_value_eu_funded: Some(1_000_037),
            avg_value_not_eu_funded: Some(125_150),
        }
    );
    Ok(())
}

#[tokio::test]
async fn box_summary_on_empty_store_has_no_values() -> Result<()> {
    let store = InMemoryStore::new();
    assert_eq!(cpv_box(&store, &QueryFilter::default()).await?, BoxSummary::default());
    Ok(())
}

#[tokio::test]
async fn cpv_rankings_use_division_descriptions() -> Result<()> {
    let store = seeded_store().await?;
    let filter = QueryFilter::default();

    let treemap = cpv_treemap(&store, &filter).await?;
    assert_eq!(
        treemap,
        vec![
            CpvCount { cpv: Some("Construction work".into()), count: 2 },
            CpvCount { cpv: Some("Repair and maintenance services".into()), count: 2 },
            CpvCount { cpv: Some("Medical equipments".into()), count: 1 },
        ]
    );

    let top = cpv_bar_1(&store, &filter).await?;
    assert_eq!(
        cpv_names(&top),
        vec!["Medical equipments", "Repair and maintenance services", "Construction work"]
    );
    assert_eq!(top[1].avg, Some(125_025.0));

    let bottom = cpv_bar_2(&store, &filter).await?;
    assert_eq!(
        cpv_names(&bottom),
        vec!["Construction work", "Repair and maintenance services", "Medical equipments"]
    );

    let funded = cpv_bar_3(&store, &filter).await?;
    assert_eq!(
        cpv_names(&funded),
        vec!["Medical equipments", "Construction work", "Repair and maintenance services"]
    );

    let unfunded = cpv_bar_4(&store, &filter).await?;
    assert_eq!(
        cpv_names(&unfunded),
        vec!["Repair and maintenance services", "Construction work"]
    );
    Ok(())
}

#[tokio::test]
async fn cpv_map_picks_best_division_per_country() -> Result<()> {
    let store = seeded_store().await?;
    let leaders = cpv_map(&store, &QueryFilter::default()).await?;

    assert_eq!(
        leaders,
        vec![
            CpvCountryLeader {
                country: Some("ESP".into()),
                cpv: Some("Medical equipments".into()),
                avg: Some(2_000_000.0),
            },
            CpvCountryLeader {
                country: Some("PRT".into()),
                cpv: Some("Repair and maintenance services".into()),
                avg: Some(125_025.0),
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn histogram_buckets_by_value_with_overflow() -> Result<()> {
    let store = seeded_store().await?;
    let filter = QueryFilter::default();

    assert_eq!(
        cpv_hist(&store, &filter, "50").await?,
        vec![
            HistogramBucket { bucket: 0, count: 1 },
            HistogramBucket { bucket: 200_000, count: 1 },
        ]
    );
    assert_eq!(
        cpv_hist(&store, &filter, "33").await?,
        vec![HistogramBucket { bucket: 1_000_000, count: 1 }]
    );
    assert!(cpv_hist(&store, &filter, "99").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn bar_diff_averages_time_and_value_gaps() -> Result<()> {
    let store = seeded_store().await?;
    let rows = cpv_bar_diff(&store, &QueryFilter::default()).await?;

    assert_eq!(
        rows,
        vec![
            CpvDifference {
                cpv: Some("Construction work".into()),
                time_difference: Some((7 * DAY_MS) as f64),
                value_difference: Some(15.0),
            },
            CpvDifference {
                cpv: Some("Repair and maintenance services".into()),
                time_difference: Some((2 * DAY_MS) as f64),
                value_difference: Some(0.0),
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn country_queries_use_names_and_alpha3() -> Result<()> {
    let store = seeded_store().await?;
    let filter = QueryFilter::default();

    let treemap = country_treemap(&store, &filter).await?;
    assert_eq!(
        treemap,
        vec![
            CountryCount { country: Some("Portugal".into()), count: 3 },
            CountryCount { country: Some("Spain".into()), count: 2 },
            CountryCount { country: Some("France".into()), count: 1 },
        ]
    );

    let top: Vec<Option<String>> = country_bar_1(&store, &filter).await?.into_iter().map(|r| r.country).collect();
    assert_eq!(top, vec![Some("Spain".into()), Some("Portugal".into()), Some("France".into())]);

    let bottom: Vec<Option<String>> =
        country_bar_2(&store, &filter).await?.into_iter().map(|r| r.country).collect();
    assert_eq!(bottom, vec![Some("France".into()), Some("Portugal".into()), Some("Spain".into())]);

    assert_eq!(
        country_map(&store, &filter).await?,
        vec![
            CountrySum { country: Some("PRT".into()), sum: Some(150.0) },
            CountrySum { country: Some("ESP".into()), sum: Some(2_000_000.0) },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn business_queries_rank_awarding_entities() -> Result<()> {
    let store = seeded_store().await?;
    let filter = QueryFilter::default();

    let top: Vec<Option<String>> = business_bar_1(&store, &filter).await?.into_iter().map(|r| r.company).collect();
    assert_eq!(top, vec![Some("Madrid".into()), Some("Porto".into()), Some("Lisboa".into())]);

    let bottom = business_bar_2(&store, &filter).await?;
    assert_eq!(bottom[0], CompanyAverage { company: Some("Lisboa".into()), avg: Some(75.0) });

    assert_eq!(
        business_treemap(&store, &filter).await?,
        vec![
            CompanyCount { company: Some("Lisboa".into()), count: 2 },
            CompanyCount { company: Some("Madrid".into()), count: 2 },
            CompanyCount { company: Some("Porto".into()), count: 1 },
        ]
    );

    assert_eq!(
        business_map(&store, &filter).await?,
        vec![
            CompanyCountryLeader {
                country: Some("ESP".into()),
                company: Some("Madrid".into()),
                sum: Some(2_000_300.0),
                address: Some("Calle 2 Madrid".into()),
            },
            CompanyCountryLeader {
                country: Some("PRT".into()),
                company: Some("Porto".into()),
                sum: Some(250_000.0),
                address: Some("Av 3 Porto".into()),
            },
        ]
    );

    let pairs = business_connection(&store, &filter).await?;
    assert_eq!(pairs.len(), 4);
    assert_eq!(pairs[0], CompanyPair { companies: Some("Lisboa with Acme".into()), count: 2 });
    Ok(())
}

#[tokio::test]
async fn filters_narrow_years_and_countries() -> Result<()> {
    let store = seeded_store().await?;

    let portugal_only = QueryFilter::new(2008, 2020, ["PT"]);
    assert_eq!(
        country_treemap(&store, &portugal_only).await?,
        vec![CountryCount { country: Some("Portugal".into()), count: 3 }]
    );

    let late_years = QueryFilter::new(2019, 2020, ["PT", "ES", "FR"]);
    assert_eq!(
        cpv_treemap(&store, &late_years).await?,
        vec![CpvCount { cpv: Some("Medical equipments".into()), count: 1 }]
    );
    Ok(())
}

#[tokio::test]
async fn catalog_executes_queries_by_name() -> Result<()> {
    let store = seeded_store().await?;
    let context = QueryContext::default();

    let count = AnalyticsQuery::from_name("ex0")?.execute(&store, &context).await?;
    assert_eq!(count, json!(6));

    let summary = AnalyticsQuery::from_name("cpv_box")?.execute(&store, &context).await?;
    assert_eq!(summary["avg_count"], json!(1));

    for query in AnalyticsQuery::all() {
        query.execute(&store, &context).await?;
    }
    Ok(())
}
