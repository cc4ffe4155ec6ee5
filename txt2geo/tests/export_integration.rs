//! Tests d'intégration : fichiers texte -> GeoJSON sur disque

use std::path::{Path, PathBuf};

use txt2geo::config::HISTORY_FILE_NAME;
use txt2geo::export::ExportError;
use txt2geo::{ExportConfig, ExportStatus, Exporter};

fn document(band: u32, parcels: &[&str]) -> String {
    let mut text = format!(
        "[属性描述]\n\
         坐标系=2000国家大地坐标系\n\
         几度分带=3\n\
         投影类型=高斯克吕格\n\
         带号={band}\n\
         [地块坐标]\n"
    );
    for (i, pid) in parcels.iter().enumerate() {
        let x = 3_500_000.0 + i as f64 * 1000.0;
        let y = band as f64 * 1_000_000.0 + 500_000.0;
        text.push_str(&format!("4,0.0100,{pid},地块,面,,,,@\n"));
        text.push_str(&format!("J1,1,{:.3},{:.3}\n", x, y));
        text.push_str(&format!("J2,1,{:.3},{:.3}\n", x + 100.0, y));
        text.push_str(&format!("J3,1,{:.3},{:.3}\n", x + 100.0, y + 100.0));
        text.push_str(&format!("J4,1,{:.3},{:.3}\n", x, y + 100.0));
    }
    text
}

struct Fixture {
    root: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("txt2geo_it_{}", name));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(root.join("in")).unwrap();
        Self { root }
    }

    fn input(&self) -> PathBuf {
        self.root.join("in")
    }

    fn output(&self) -> PathBuf {
        self.root.join("out")
    }

    fn write(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.input().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn config(&self) -> ExportConfig {
        ExportConfig {
            inputs: vec![self.input()],
            output: self.output(),
            format: "GEOJSON".to_string(),
            ..Default::default()
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn export_error(err: &anyhow::Error) -> &ExportError {
    err.downcast_ref::<ExportError>()
        .unwrap_or_else(|| panic!("unexpected error: {err:#}"))
}

#[tokio::test]
async fn test_split_export_writes_one_file_per_input() {
    let fx = Fixture::new("split");
    fx.write("a.txt", document(39, &["P001", "P002"]));
    fx.write("b.txt", document(40, &["P101"]));

    let exporter = Exporter::new(fx.config()).unwrap();
    let report = exporter.execute().await.unwrap();

    assert_eq!(report.status, ExportStatus::Success);
    assert_eq!(report.files_found, 2);
    assert_eq!(report.datasets_written, 2);
    assert_eq!(report.features_written, 3);

    let a = read_json(&fx.output().join("a.geojson"));
    assert_eq!(a["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4527");
    assert_eq!(a["features"].as_array().unwrap().len(), 2);
    assert_eq!(a["features"][0]["properties"]["pid"], "P001");
    assert_eq!(a["features"][0]["properties"]["_source"], "a.txt");

    let b = read_json(&fx.output().join("b.geojson"));
    assert_eq!(b["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4528");

    let history = std::fs::read_to_string(fx.output().join(HISTORY_FILE_NAME)).unwrap();
    assert_eq!(history.lines().count(), 2);
}

#[tokio::test]
async fn test_second_run_skips_recorded_files() {
    let fx = Fixture::new("rerun");
    fx.write("a.txt", document(39, &["P001"]));

    Exporter::new(fx.config()).unwrap().execute().await.unwrap();

    let err = Exporter::new(fx.config()).unwrap().execute().await.unwrap_err();
    assert!(matches!(
        export_error(&err),
        ExportError::NothingToProcess { skipped: 1, .. }
    ));

    // force-refresh sans overwrite : le fichier existant est protégé
    let mut config = fx.config();
    config.force_refresh = true;
    let report = Exporter::new(config.clone()).unwrap().execute().await.unwrap();
    assert_eq!(report.status, ExportStatus::Failed);
    assert!(report.errors[0].message.contains("--overwrite"));

    config.overwrite = true;
    let report = Exporter::new(config).unwrap().execute().await.unwrap();
    assert_eq!(report.status, ExportStatus::Success);

    let history = std::fs::read_to_string(fx.output().join(HISTORY_FILE_NAME)).unwrap();
    assert_eq!(history.lines().count(), 1);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let fx = Fixture::new("dryrun");
    fx.write("a.txt", document(39, &["P001"]));
    fx.write("b.txt", document(39, &["P002"]));

    let mut config = fx.config();
    config.dry_run = true;
    let report = Exporter::new(config).unwrap().execute().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.datasets_written, 2);
    assert!(!fx.output().exists());
}

#[tokio::test]
async fn test_merge_export_with_template() {
    let fx = Fixture::new("merge");
    fx.write("a.txt", document(39, &["P001"]));
    fx.write("b.txt", document(39, &["P002", "P003"]));

    let mut config = fx.config();
    config.merge = true;
    config.name_template = "{name:upper}_{count}.geojson".to_string();
    let report = Exporter::new(config).unwrap().execute().await.unwrap();

    assert_eq!(report.datasets_written, 1);
    let merged = read_json(&fx.output().join("MERGED_OUTPUT_1.geojson"));
    let features = merged["features"].as_array().unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(features[2]["properties"]["_source"], "b.txt");
}

#[tokio::test]
async fn test_merge_across_zones_is_rejected() {
    let fx = Fixture::new("mixedzones");
    fx.write("a.txt", document(39, &["P001"]));
    fx.write("b.txt", document(40, &["P101"]));

    let mut config = fx.config();
    config.merge = true;
    let report = Exporter::new(config).unwrap().execute().await.unwrap();

    assert_eq!(report.status, ExportStatus::Failed);
    assert_eq!(report.datasets_written, 0);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].message.contains("coordinate systems differ"));
    assert!(!fx.output().join("merged_output.geojson").exists());
    assert!(!fx.output().join(HISTORY_FILE_NAME).exists());
}

#[tokio::test]
async fn test_bad_file_is_isolated() {
    let fx = Fixture::new("partial");
    fx.write("good.txt", document(39, &["P001"]));
    fx.write("bad.txt", document(39, &["P001"]).replace("带号=39\n", ""));

    let report = Exporter::new(fx.config()).unwrap().execute().await.unwrap();

    assert_eq!(report.status, ExportStatus::PartialSuccess);
    assert_eq!(report.files_processed, 1);
    assert_eq!(report.files_failed, 1);
    assert!(report.errors[0].path.ends_with("bad.txt"));
    assert!(report.errors[0].message.contains("带号"));
    assert!(fx.output().join("good.geojson").exists());
    assert!(!fx.output().join("bad.geojson").exists());
}

#[tokio::test]
async fn test_all_files_failing_is_an_error() {
    let fx = Fixture::new("allfail");
    fx.write("bad.txt", "not a coordinate file");

    let err = Exporter::new(fx.config()).unwrap().execute().await.unwrap_err();
    assert!(matches!(export_error(&err), ExportError::AllFailed { failed: 1 }));
}

#[tokio::test]
async fn test_duplicate_content_is_skipped() {
    let fx = Fixture::new("duplicate");
    let text = document(39, &["P001"]);
    fx.write("a.txt", &text);
    fx.write("copy.txt", &text);

    let report = Exporter::new(fx.config()).unwrap().execute().await.unwrap();

    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.datasets_written, 1);
    assert!(fx.output().join("a.geojson").exists());
}

#[tokio::test]
async fn test_gb18030_input() {
    let fx = Fixture::new("gb18030");
    let doc = document(39, &["P001"]);
    let (bytes, _, _) = encoding_rs::GB18030.encode(&doc);
    fx.write("gbk.txt", &*bytes);

    let report = Exporter::new(fx.config()).unwrap().execute().await.unwrap();
    assert_eq!(report.status, ExportStatus::Success);

    let out = read_json(&fx.output().join("gbk.geojson"));
    assert_eq!(out["features"][0]["properties"]["pname"], "地块");
}

#[tokio::test]
async fn test_missing_inputs() {
    let fx = Fixture::new("empty");
    fx.write("notes.md", "nothing here");

    let err = Exporter::new(fx.config()).unwrap().execute().await.unwrap_err();
    assert!(matches!(export_error(&err), ExportError::NoInputFiles));
}

#[test]
fn test_external_format_requires_writer() {
    let fx = Fixture::new("nowriter");
    let mut config = fx.config();
    config.format = "GPKG".to_string();

    let err = Exporter::new(config.clone()).err().unwrap();
    assert!(matches!(
        export_error(&err),
        ExportError::WriterNotConfigured { format: "GPKG" }
    ));

    // Le dry-run n'a pas besoin du writer
    config.dry_run = true;
    assert!(Exporter::new(config).is_ok());
}
