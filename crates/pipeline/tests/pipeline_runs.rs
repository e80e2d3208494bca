//! Pipeline runs over synthetic composites written to a temporary directory.
//!
//! Every test builds its own `data/raw` composites and zone layer, then
//! drives the stages through the public `Pipeline` API.

use approx::assert_relative_eq;
use landshift_core::io::{read_geotiff, write_geotiff_bands};
use landshift_core::{BandStack, GeoTransform, Raster, CRS};
use landshift_pipeline::{ChangeMethod, Layout, Pipeline, PipelineConfig, PipelineError, ProcessingMode, Stage};
use std::path::Path;
use tempfile::TempDir;

const ROWS: usize = 4;
const COLS: usize = 4;

/// Raw L2A digital numbers: Blue, Green, Red, NIR, SWIR1, SWIR2
const VEGETATED: [f64; 6] = [300.0, 500.0, 400.0, 3000.0, 1500.0, 1000.0];
const BUILT_UP: [f64; 6] = [900.0, 1100.0, 1500.0, 1800.0, 3000.0, 2500.0];
const FILL: [f64; 6] = [0.0; 6];

fn composite(pixel: impl Fn(usize, usize) -> [f64; 6]) -> BandStack {
    let bands = (0..6)
        .map(|b| {
            let values = (0..ROWS * COLS).map(|i| pixel(i / COLS, i % COLS)[b]).collect();
            let mut band = Raster::from_vec(values, ROWS, COLS).unwrap();
            band.set_transform(GeoTransform::new(260_000.0, 6_345_000.0, 10.0, -10.0));
            band.set_crs(Some(CRS::utm_19s()));
            band
        })
        .collect();
    BandStack::new(bands).unwrap()
}

const ZONES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "zone_id": "B" },
      "geometry": { "type": "Polygon", "coordinates": [[
        [260020.0, 6344960.0], [260040.0, 6344960.0], [260040.0, 6345000.0],
        [260020.0, 6345000.0], [260020.0, 6344960.0]
      ]] }
    },
    {
      "type": "Feature",
      "properties": { "zone_id": "A" },
      "geometry": { "type": "Polygon", "coordinates": [[
        [260000.0, 6344960.0], [260020.0, 6344960.0], [260020.0, 6345000.0],
        [260000.0, 6345000.0], [260000.0, 6344960.0]
      ]] }
    }
  ]
}"#;

fn workspace() -> (TempDir, Pipeline) {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();
    let layout = Layout::rooted_at(&config.paths, dir.path());
    std::fs::create_dir_all(dir.path().join("data/raw")).unwrap();
    std::fs::create_dir_all(dir.path().join("data/vector")).unwrap();

    let pipeline = Pipeline::new(config)
        .with_layout(layout)
        .with_mode(ProcessingMode::Sequential);
    (dir, pipeline)
}

/// 2019 fully vegetated; by 2020 the first column is built up and the
/// bottom-right pixel lies outside the acquisition footprint
fn write_two_years(pipeline: &Pipeline) {
    let layout = pipeline.layout();
    write_geotiff_bands(&composite(|_, _| VEGETATED), layout.reflectance(2019)).unwrap();
    write_geotiff_bands(
        &composite(|row, col| match (row, col) {
            (_, 0) => BUILT_UP,
            (3, 3) => FILL,
            _ => VEGETATED,
        }),
        layout.reflectance(2020),
    )
    .unwrap();
}

fn read_table(path: &Path) -> (csv::StringRecord, Vec<csv::StringRecord>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().clone();
    let rows = reader.records().collect::<Result<Vec<_>, _>>().unwrap();
    (header, rows)
}

fn column(header: &csv::StringRecord, name: &str) -> usize {
    header.iter().position(|h| h == name).unwrap()
}

#[test]
fn full_run_produces_rasters_and_tables() {
    let (_dir, pipeline) = workspace();
    write_two_years(&pipeline);
    std::fs::write(pipeline.layout().zones(), ZONES).unwrap();

    let reports = pipeline.run(2019, 2020, ChangeMethod::All).unwrap();
    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert!(report.is_success(), "{} failed: {:?}", report.stage, report.failed);
    }

    let layout = pipeline.layout();
    let classes: Raster<u8> = read_geotiff(layout.urban(2019, 2020), None).unwrap();
    for row in 0..ROWS {
        assert_eq!(classes.get(row, 0).unwrap(), 1);
    }
    assert_eq!(classes.get(0, 2).unwrap(), 0);
    assert_eq!(classes.get(3, 3).unwrap(), 255);

    let trend: Raster<i8> = read_geotiff(layout.trend(2019, 2020), None).unwrap();
    assert_eq!(trend.get(0, 0).unwrap(), -1);
    assert_eq!(trend.get(1, 1).unwrap(), 0);
    assert_eq!(trend.get(3, 3).unwrap(), i8::MIN);

    let (header, rows) = read_table(&layout.zonal_changes_report(2019, 2020));
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "A");
    assert_eq!(&rows[1][0], "B");

    let urban_px = column(&header, "urbanization_px");
    let urban_pct = column(&header, "urbanization_pct");
    let nodata = column(&header, "nodata_pixels");
    assert_eq!(&rows[0][urban_px], "4");
    assert_relative_eq!(rows[0][urban_pct].parse::<f64>().unwrap(), 50.0);
    assert_eq!(&rows[1][urban_px], "0");
    assert_eq!(&rows[1][nodata], "1");
    // delta columns come from the difference raster of the same run
    assert!(header.iter().any(|h| h == "delta_ndvi_mean"));

    assert!(layout.zonal_trend_report(2019, 2020).is_file());
    assert!(layout.summary_report(2019, 2020).is_file());
    // a single historical year leaves every z-score undefined
    let (_, anomaly_rows) = read_table(&layout.zonal_anomaly_report(2020));
    assert_eq!(anomaly_rows.len(), 2);

    let (_, stats) = read_table(&layout.index_statistics_report());
    assert_eq!(stats.len(), 8);
}

#[test]
fn detect_without_indices_names_producer() {
    let (_dir, pipeline) = workspace();

    let report = pipeline.detect(2019, 2020, ChangeMethod::UrbanClassification).unwrap();
    assert!(report.all_failed());

    match report.failure("urban-classification") {
        Some(PipelineError::MissingInput { path, stage, producer }) => {
            assert!(path.ends_with("indices_2019.tif"));
            assert_eq!(*stage, Stage::Detect);
            assert_eq!(*producer, Stage::Indices);
        }
        other => panic!("expected a missing input, got {:?}", other),
    }
}

#[test]
fn failing_year_does_not_stop_others() {
    let (_dir, pipeline) = workspace();
    let layout = pipeline.layout();

    write_geotiff_bands(&composite(|_, _| VEGETATED), layout.reflectance(2019)).unwrap();
    std::fs::write(layout.reflectance(2020), b"not a tiff").unwrap();
    let three_bands = BandStack::new(composite(|_, _| VEGETATED).into_bands().into_iter().take(3).collect()).unwrap();
    write_geotiff_bands(&three_bands, layout.reflectance(2021)).unwrap();

    let report = pipeline.indices(&[]).unwrap();
    assert_eq!(report.completed, vec!["2019".to_string()]);
    assert_eq!(report.failed.len(), 2);
    assert!(matches!(
        report.failure("2021"),
        Some(PipelineError::Core(landshift_core::Error::BandCount { expected: 6, actual: 3 }))
    ));
    assert!(layout.indices(2019).is_file());
    assert!(!layout.indices(2020).exists());
}

#[test]
fn year_pair_is_validated_before_running() {
    let (_dir, pipeline) = workspace();
    write_two_years(&pipeline);

    assert!(matches!(
        pipeline.run(2020, 2019, ChangeMethod::All),
        Err(PipelineError::InvalidYearRange(_))
    ));
    assert!(matches!(
        pipeline.detect(2019, 2031, ChangeMethod::Difference),
        Err(PipelineError::InvalidYearRange(_))
    ));
    assert!(!pipeline.layout().indices(2019).exists());
}

#[test]
fn zonal_without_zones_fails() {
    let (_dir, pipeline) = workspace();
    write_two_years(&pipeline);
    pipeline.indices(&[2019, 2020]).unwrap();
    pipeline.detect(2019, 2020, ChangeMethod::UrbanClassification).unwrap();

    let err = pipeline
        .zonal(2019, 2020, &[ChangeMethod::UrbanClassification])
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingInput {
            producer: Stage::Acquisition,
            ..
        }
    ));
}

#[test]
fn zones_in_another_crs_fail_the_table() {
    let (_dir, pipeline) = workspace();
    write_two_years(&pipeline);
    // same footprint digitised in lon/lat over a UTM 19S raster
    let lonlat = r#"{
      "type": "FeatureCollection",
      "features": [{
        "type": "Feature",
        "properties": { "zone_id": "A" },
        "geometry": { "type": "Polygon", "coordinates": [[
          [-71.62, -33.05], [-71.60, -33.05], [-71.60, -33.03], [-71.62, -33.03], [-71.62, -33.05]
        ]] }
      }]
    }"#;
    std::fs::write(pipeline.layout().zones(), lonlat).unwrap();
    pipeline.indices(&[2019, 2020]).unwrap();
    pipeline.detect(2019, 2020, ChangeMethod::UrbanClassification).unwrap();

    let report = pipeline
        .zonal(2019, 2020, &[ChangeMethod::UrbanClassification])
        .unwrap();
    assert!(report.all_failed());
    match report.failure("urban") {
        Some(PipelineError::Core(landshift_core::Error::Vector(msg))) => {
            assert!(msg.contains("EPSG:32719"), "{}", msg);
            assert!(msg.contains("CRS"), "{}", msg);
        }
        other => panic!("expected a zone coverage error, got {:?}", other),
    }
    assert!(!pipeline.layout().zonal_changes_report(2019, 2020).exists());
}
