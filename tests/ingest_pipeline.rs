use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use ted_insights::config::IngestConfig;
use ted_insights::constants::{ANALYTICS_COLLECTION, INTAKE_COLLECTION, STAGING_COLLECTION};
use ted_insights::domain::{AnalyticsRecord, ContractRecord};
use ted_insights::engine::{Document, Filter, Pipeline};
use ted_insights::{AnalyticsError, DocumentStore, InMemoryStore, Ingestor};

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn contract(cpv: i64, country: &str, year: i64, value: f64) -> Document {
    doc(json!({
        "VALUE_EURO": value,
        "AWARD_VALUE_EURO": value * 1.1,
        "NUMBER_OFFERS": 3,
        "CPV": cpv,
        "YEAR": year,
        "ISO_COUNTRY_CODE": country,
        "B_EU_FUNDS": "Y",
        "CAE_NAME": "Camara Municipal de Lisboa",
        "CAE_ADDRESS": "Praca do Municipio",
        "CAE_TOWN": "Lisboa",
        "WIN_NAME": "Construtora Lda",
        "DT_DISPATCH": "2015-04-01",
        "DT_AWARD": "2015-03-12"
    }))
}

fn setup() -> (Arc<InMemoryStore>, Ingestor) {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = Ingestor::new(store.clone(), IngestConfig::default());
    (store, ingestor)
}

async fn analytics(store: &InMemoryStore) -> Result<Vec<AnalyticsRecord>> {
    let documents = store.aggregate(ANALYTICS_COLLECTION, &Pipeline::new()).await?;
    Ok(documents
        .iter()
        .map(AnalyticsRecord::from_document)
        .collect::<ted_insights::Result<Vec<_>>>()?)
}

#[tokio::test]
async fn admitted_batch_is_published_in_full() -> Result<()> {
    let (store, ingestor) = setup();
    let batch = vec![
        contract(45_000_000, "PT", 2015, 250_000.0),
        contract(50_123_400, "ES", 2008, 10.0),
        contract(3_311_000, "FR", 2020, 99_999_999.0),
    ];

    let ids = ingestor.insert_operation(batch).await?.expect("records admitted");

    assert_eq!(ids.len(), 3);
    assert_eq!(store.count_documents(INTAKE_COLLECTION).await?, 3);
    assert_eq!(store.count_documents(STAGING_COLLECTION).await?, 3);
    assert_eq!(store.count_documents(ANALYTICS_COLLECTION).await?, 3);

    let published = store.find_by_ids(ANALYTICS_COLLECTION, &ids).await?;
    assert_eq!(published.len(), 3);
    Ok(())
}

#[tokio::test]
async fn nothing_admitted_returns_none_and_writes_nothing_downstream() -> Result<()> {
    let (store, ingestor) = setup();
    let batch = vec![
        contract(45_000_000, "PT", 2007, 1_000.0),
        contract(45_000_000, "PT", 2021, 1_000.0),
        contract(45_000_000, "US", 2015, 1_000.0),
        contract(45_000_000, "PT", 2015, 100_000_000.0),
    ];

    let report = ingestor.ingest(batch).await?;

    assert!(report.analytics_ids.is_none());
    assert_eq!(report.intake, 4);
    assert_eq!(report.rejected, 4);
    assert_eq!(store.count_documents(INTAKE_COLLECTION).await?, 4);
    assert_eq!(store.count_documents(STAGING_COLLECTION).await?, 0);
    assert_eq!(store.count_documents(ANALYTICS_COLLECTION).await?, 0);
    Ok(())
}

#[tokio::test]
async fn short_cpv_codes_regain_their_leading_zero() -> Result<()> {
    let (store, ingestor) = setup();
    ingestor
        .insert_operation(vec![
            contract(3_311_000, "PT", 2015, 1_000.0),
            contract(50_123_400, "PT", 2015, 1_000.0),
            contract(9_999_999, "PT", 2015, 1_000.0),
            contract(10_000_000, "PT", 2015, 1_000.0),
        ])
        .await?;

    let mut records = analytics(&store).await?;
    records.sort_by(|a, b| a.cpv.cmp(&b.cpv));
    let codes: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.cpv.as_deref().unwrap_or_default(), r.cpv_division.as_str()))
        .collect();

    assert_eq!(
        codes,
        vec![
            ("03311000", "03"),
            ("09999999", "09"),
            ("10000000", "10"),
            ("50123400", "50"),
        ]
    );
    assert!(records.iter().all(|r| r.cpv_division.len() == 2));
    assert!(records.iter().all(|r| r.n_cpv.as_ref().is_some_and(Value::is_number)));
    Ok(())
}

#[tokio::test]
async fn legacy_country_code_never_reaches_analytics() -> Result<()> {
    let (store, ingestor) = setup();
    ingestor
        .insert_operation(vec![
            contract(45_000_000, "UK", 2015, 1_000.0),
            contract(45_000_000, "UK", 2016, 2_000.0),
            contract(45_000_000, "GB", 2017, 3_000.0),
        ])
        .await?;

    let legacy = store
        .aggregate(
            ANALYTICS_COLLECTION,
            &Pipeline::new().filter(Filter::eq("ISO_COUNTRY_CODE", "UK")),
        )
        .await?;
    assert!(legacy.is_empty());

    let records = analytics(&store).await?;
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.iso_country_code.as_deref() == Some("GB")));
    Ok(())
}

#[tokio::test]
async fn address_and_pair_tolerate_missing_parts() -> Result<()> {
    let (store, ingestor) = setup();
    let mut no_address = contract(45_000_000, "PT", 2015, 1_000.0);
    no_address.remove("CAE_ADDRESS");
    no_address.remove("WIN_NAME");
    let mut null_town = contract(45_000_000, "PT", 2015, 1_000.0);
    null_town.insert("CAE_TOWN".to_string(), Value::Null);

    ingestor.insert_operation(vec![no_address, null_town]).await?;

    let mut addresses: Vec<String> = analytics(&store)
        .await?
        .into_iter()
        .filter_map(|r| r.address)
        .collect();
    addresses.sort();
    assert_eq!(addresses, vec![" Lisboa", "Praca do Municipio "]);

    let pairs: Vec<String> = analytics(&store).await?.into_iter().filter_map(|r| r.pair).collect();
    assert!(pairs.contains(&"Camara Municipal de Lisboa with ".to_string()));
    Ok(())
}

#[tokio::test]
async fn single_legacy_record_end_to_end() -> Result<()> {
    let (store, ingestor) = setup();
    let record = ContractRecord {
        value_euro: Some(500_000.0),
        award_value_euro: Some(480_000.0),
        cpv: Some(json!(50_123_400)),
        year: Some(2015),
        iso_country_code: Some("UK".to_string()),
        b_eu_funds: Some("N".to_string()),
        cae_name: Some("Borough Council".to_string()),
        cae_address: Some("1 High Street".to_string()),
        cae_town: Some("Leeds".to_string()),
        win_name: Some("Builders plc".to_string()),
        dt_dispatch: Some("2015-06-30 00:00:00".to_string()),
        dt_award: Some("2015-06-01".to_string()),
        ..Default::default()
    };

    let ids = ingestor.insert_records(&[record]).await?.expect("record admitted");
    assert_eq!(ids.len(), 1);

    let records = analytics(&store).await?;
    assert_eq!(records.len(), 1);
    let published = &records[0];
    assert_eq!(published.id, ids[0].to_string());
    assert_eq!(published.cpv_division, "50");
    assert_eq!(published.iso_country_code.as_deref(), Some("GB"));
    assert_eq!(published.address.as_deref(), Some("1 High Street Leeds"));
    assert_eq!(published.pair.as_deref(), Some("Borough Council with Builders plc"));
    assert!(published.dt_award.is_some());
    Ok(())
}

#[tokio::test]
async fn six_digit_cpv_is_padded_into_division_05() -> Result<()> {
    let (store, ingestor) = setup();
    let record = ContractRecord {
        value_euro: Some(500_000.0),
        cpv: Some(json!(501_234)),
        year: Some(2015),
        iso_country_code: Some("UK".to_string()),
        award_value_euro: Some(500_000.0),
        cae_address: Some("1 High St".to_string()),
        cae_town: Some("Leeds".to_string()),
        ..Default::default()
    };

    let ids = ingestor.insert_records(&[record]).await?;
    assert_eq!(ids.map(|ids| ids.len()), Some(1));

    let records = analytics(&store).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].cpv.as_deref(), Some("0501234"));
    assert_eq!(records[0].cpv_division, "05");
    assert_eq!(records[0].iso_country_code.as_deref(), Some("GB"));
    assert_eq!(records[0].address.as_deref(), Some("1 High St Leeds"));
    Ok(())
}

#[tokio::test]
async fn records_with_their_own_ids_are_kept_and_published() -> Result<()> {
    let (store, ingestor) = setup();
    let mut object_id = contract(45_000_000, "PT", 2015, 1_000.0);
    object_id.insert("_id".to_string(), json!("5f1a2b3c4d5e6f7a8b9c0d1e"));
    let mut numeric_id = contract(45_000_000, "ES", 2016, 2_000.0);
    numeric_id.insert("_id".to_string(), json!(42));

    let ids = ingestor.insert_operation(vec![object_id, numeric_id]).await?;
    assert_eq!(ids.map(|ids| ids.len()), Some(2));

    let intake = store.aggregate(INTAKE_COLLECTION, &Pipeline::new()).await?;
    let intake_ids: Vec<&Value> = intake.iter().map(|d| &d["_id"]).collect();
    assert_eq!(intake_ids, vec![&json!("5f1a2b3c4d5e6f7a8b9c0d1e"), &json!(42)]);

    let published = analytics(&store).await?;
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|r| r.id != "5f1a2b3c4d5e6f7a8b9c0d1e"));
    Ok(())
}

#[tokio::test]
async fn ingest_file_reads_a_json_array() -> Result<()> {
    let (store, ingestor) = setup();
    let mut file = tempfile::NamedTempFile::new()?;
    let batch = json!([
        contract(45_000_000, "PT", 2015, 1_000.0),
        contract(45_000_000, "US", 2015, 1_000.0),
    ]);
    write!(file, "{batch}")?;

    let report = ingestor.ingest_file(file.path()).await?;

    assert_eq!(report.intake, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.published(), 1);
    assert_eq!(store.count_documents(ANALYTICS_COLLECTION).await?, 1);
    Ok(())
}

#[tokio::test]
async fn missing_award_value_is_still_admitted() -> Result<()> {
    let (store, ingestor) = setup();
    let mut record = contract(45_000_000, "PT", 2015, 1_000.0);
    record.remove("AWARD_VALUE_EURO");

    let ids = ingestor.insert_operation(vec![record]).await?;

    assert_eq!(ids.map(|ids| ids.len()), Some(1));
    let published = store.aggregate(ANALYTICS_COLLECTION, &Pipeline::new()).await?;
    assert!(!published[0].contains_key("AWARD_VALUE_EURO"));
    Ok(())
}

#[tokio::test]
async fn earlier_batches_are_not_patched_again() -> Result<()> {
    let (store, ingestor) = setup();
    ingestor
        .insert_operation(vec![contract(3_311_000, "PT", 2015, 1_000.0)])
        .await?;
    ingestor
        .insert_operation(vec![contract(3_311_000, "UK", 2016, 1_000.0)])
        .await?;

    let staged = store.aggregate(STAGING_COLLECTION, &Pipeline::new()).await?;
    assert_eq!(staged.len(), 2);
    assert!(staged.iter().all(|d| d["CPV"] == json!("03311000")));

    let codes: Vec<String> = analytics(&store)
        .await?
        .into_iter()
        .filter_map(|r| r.cpv)
        .collect();
    assert_eq!(codes, vec!["03311000", "03311000"]);
    Ok(())
}

#[tokio::test]
async fn invalid_date_aborts_and_leaves_intake_in_place() -> Result<()> {
    let (store, ingestor) = setup();
    let mut record = contract(45_000_000, "PT", 2015, 1_000.0);
    record.insert("DT_AWARD".to_string(), json!("31/12/2015"));

    let err = ingestor.insert_operation(vec![record]).await.unwrap_err();

    assert!(matches!(err, AnalyticsError::InvalidDate { .. }));
    assert_eq!(store.count_documents(INTAKE_COLLECTION).await?, 1);
    assert_eq!(store.count_documents(ANALYTICS_COLLECTION).await?, 0);
    Ok(())
}
