use geovax::model::location::LocationRecord;

#[test]
fn initialized_location_data_snapshot() {
    let records = vec![
        LocationRecord::zeroed("Paramaribo", 240000),
        LocationRecord::zeroed("Wanica", 118000),
    ];
    for record in &records {
        record.check().expect("zeroed records hold the invariants");
    }

    let json = serde_json::to_string_pretty(&records).expect("serialize");
    insta::assert_snapshot!(json);
}
