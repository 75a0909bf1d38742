use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use bacasm_pipelines::config::defs::PipelineError;
use bacasm_pipelines::utils::layout::{Mate, SampleLayout};
use bacasm_pipelines::utils::samplesheet::{SampleStage, Samplesheet};
use tempfile::TempDir;

const RAW_SHEET: &str = "\
#sample_id,alias,r1,r2,singles,taxonomy
S1,cust-1,/reads/S1_R1.fq.gz,/reads/S1_R2.fq.gz,,Salmonella enterica
S2,cust-2,/reads/S2_R1.fq.gz,/reads/S2_R2.fq.gz,/reads/S2_S.fq.gz,590
S3,cust-3,/reads/S3.fq.gz,,,
";


#[test]
fn test_csv_round_trip_at_every_stage() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("samples.csv");
    fs::write(&input, RAW_SHEET)?;
    let out = tmp.path().join("run");

    let mut sheet = Samplesheet::from_path(&input)?;
    for stage in [SampleStage::Trimmed, SampleStage::Normalized, SampleStage::Assembled, SampleStage::Annotated] {
        sheet.upgrade(stage, &out);
        let path = tmp.path().join(format!("{:?}.csv", stage));
        sheet.write(&path)?;
        let reread = Samplesheet::from_path(&path)?;
        assert_eq!(reread, sheet, "round trip at {:?}", stage);
        assert!(reread.iter().all(|s| s.stage() == stage));
    }
    Ok(())
}

#[test]
fn test_yaml_round_trip() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut sheet = Samplesheet::from_csv_reader(RAW_SHEET.as_bytes())?;
    sheet.upgrade(SampleStage::Assembled, tmp.path());

    let path = tmp.path().join("sheet.yml");
    sheet.write(&path)?;
    let text = fs::read_to_string(&path)?;
    assert!(text.contains("id: S1"));
    assert!(!text.contains("ann_fna"));

    assert_eq!(Samplesheet::from_path(&path)?, sheet);
    Ok(())
}

#[test]
fn test_upgrade_keeps_existing_paths_and_layout() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut sheet = Samplesheet::from_csv_reader(RAW_SHEET.as_bytes())?;
    sheet.upgrade(SampleStage::Normalized, tmp.path());

    let s1 = sheet.get("S1").unwrap();
    let layout = SampleLayout::new(tmp.path(), "S1");
    assert_eq!(s1.trim_r2, Some(layout.trimmed(Mate::R2)));
    assert_eq!(s1.norm_singles, Some(layout.normalized(Mate::Singles)));
    assert_eq!(s1.assembly, None);

    let s3 = sheet.get("S3").unwrap();
    assert!(!s3.is_paired());
    assert_eq!(s3.trim_r2, None);
    assert_eq!(s3.r1, Some(PathBuf::from("/reads/S3.fq.gz")));

    let other = tmp.path().join("elsewhere");
    sheet.upgrade(SampleStage::Normalized, &other);
    assert_eq!(sheet.get("S1").unwrap().trim_r2, Some(layout.trimmed(Mate::R2)));
    Ok(())
}

#[test]
fn test_subset_written_in_sheet_order() -> Result<()> {
    let tmp = TempDir::new()?;
    let sheet = Samplesheet::from_csv_reader(RAW_SHEET.as_bytes())?;
    let path = tmp.path().join("subset.csv");
    sheet.write_subset(&["S3", "S1", "missing"], &path)?;
    assert_eq!(Samplesheet::from_path(&path)?.ids(), vec!["S1", "S3"]);
    Ok(())
}

#[test]
fn test_bad_sheets_rejected() {
    let dup = "S1,a,/r/1.fq\nS1,b,/r/2.fq\n";
    assert!(matches!(
        Samplesheet::from_csv_reader(dup.as_bytes()),
        Err(PipelineError::Samplesheet(_))
    ));
    assert!(Samplesheet::from_csv_reader("S1,a\n".as_bytes()).is_err());
    assert!(matches!(
        Samplesheet::from_path(&PathBuf::from("/nonexistent/samples.csv")),
        Err(PipelineError::MissingInput(_))
    ));
}

#[test]
fn test_missing_paths_checked_on_demand() -> Result<()> {
    let tmp = TempDir::new()?;
    let r1 = tmp.path().join("S1_R1.fq.gz");
    fs::write(&r1, "")?;
    let r2 = tmp.path().join("S1_R2.fq.gz");
    let text = format!("S1,cust-1,{},{}\n", r1.display(), r2.display());

    // loading does not look at the filesystem
    let mut sheet = Samplesheet::from_csv_reader(text.as_bytes())?;
    assert_eq!(sheet.get("S1").unwrap().missing_paths(), vec![r2.clone()]);

    sheet.upgrade(SampleStage::Trimmed, tmp.path());
    let layout = SampleLayout::new(tmp.path(), "S1");
    let missing = sheet.get("S1").unwrap().missing_paths();
    assert!(missing.contains(&r2));
    assert!(missing.contains(&layout.trimmed(Mate::R1)));
    assert!(!missing.contains(&r1));

    fs::write(&r2, "")?;
    assert!(!sheet.get("S1").unwrap().missing_paths().contains(&r2));
    Ok(())
}
