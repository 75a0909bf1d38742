use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::LevelFilter;
use tempfile::TempDir;

use bacasm_pipelines::cli::{Arguments, PackageStage, Stage};
use bacasm_pipelines::config::defs::{PipelineError, RunConfig};
use bacasm_pipelines::config::settings::{Thresholds, WorkflowConfig};
use bacasm_pipelines::pipelines::survey::{self, evaluate, REASON_INCONSISTENT, REASON_LOW, REASON_MISSING, REASON_SMALL};
use bacasm_pipelines::pipelines::{annotate, assemble, package};
use bacasm_pipelines::utils::file::read_tsv;
use bacasm_pipelines::utils::layout::{Mate, SampleLayout};
use bacasm_pipelines::utils::samplesheet::{SampleStage, Samplesheet};

const SHEET: &str = "\
#sample_id,alias,r1,r2,singles,taxonomy
GOOD,g,/reads/GOOD_1.fq.gz,/reads/GOOD_2.fq.gz,,Salmonella
UNEVEN,u,/reads/UNEVEN_1.fq.gz,/reads/UNEVEN_2.fq.gz,,Salmonella
FEW,f,/reads/FEW_1.fq.gz,/reads/FEW_2.fq.gz,,Salmonella
SINGLE,s,/reads/SINGLE.fq.gz,,,Salmonella
";

fn write_file(path: &Path, body: &str) -> Result<()> {
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, body)?;
    Ok(())
}

fn fastqc(layout: &SampleLayout, mate: Mate, reads: u64) -> Result<()> {
    write_file(
        &layout.fastqc_data(mate),
        &format!("##FastQC\t0.11.9\n>>Basic Statistics\tpass\n#Measure\tValue\nTotal Sequences\t{}\n>>END_MODULE\n", reads),
    )
}

fn kat(layout: &SampleLayout, volumes: &[f64]) -> Result<()> {
    let peaks: Vec<String> = volumes.iter().map(|v| format!("{{\"mean\": 30.0, \"volume\": {}}}", v)).collect();
    write_file(
        &layout.kat_json(),
        &format!("{{\"k\": 27, \"nb_peaks\": {}, \"peaks\": [{}]}}", volumes.len(), peaks.join(", ")),
    )
}

fn survey_stats(layout: &SampleLayout, size: u64) -> Result<()> {
    write_file(
        &layout.survey_stats(),
        &format!("n_scaffolds\tn_contigs\tscaf_bp\tcontig_bp\tgap_pct\n80\t80\t{}\t{}\t0.000\n", size, size),
    )
}

/// Survey outputs for the four samples in SHEET.
fn survey_outputs(out: &Path) -> Result<()> {
    let good = SampleLayout::new(out, "GOOD");
    fastqc(&good, Mate::R1, 250_000)?;
    fastqc(&good, Mate::R2, 250_000)?;
    kat(&good, &[950.0, 50.0])?;
    survey_stats(&good, 4_800_000)?;

    // both mates are under the minimum as well as unequal
    let uneven = SampleLayout::new(out, "UNEVEN");
    fastqc(&uneven, Mate::R1, 50_000)?;
    fastqc(&uneven, Mate::R2, 60_000)?;
    kat(&uneven, &[1000.0])?;
    survey_stats(&uneven, 4_800_000)?;

    let few = SampleLayout::new(out, "FEW");
    fastqc(&few, Mate::R1, 50_000)?;
    fastqc(&few, Mate::R2, 50_000)?;
    kat(&few, &[1000.0])?;
    survey_stats(&few, 4_800_000)?;

    let single = SampleLayout::new(out, "SINGLE");
    fastqc(&single, Mate::R1, 300_000)?;
    survey_stats(&single, 500_000)?;
    Ok(())
}

fn run_config(tmp: &Path, stage: Stage, samplesheet: &Path) -> RunConfig {
    let out_dir = tmp.join("run");
    let mut workflow = WorkflowConfig::default();
    workflow.apply_stage(stage, samplesheet, &out_dir, &tmp.join("workflow"));
    RunConfig {
        cwd: tmp.to_path_buf(),
        out_dir,
        args: Arguments {
            stage,
            samplesheet: samplesheet.to_string_lossy().into_owned(),
            report_only: true,
            prefix: "bacasm".to_string(),
            ..Default::default()
        },
        workflow,
        cores: 1,
        log_level: LevelFilter::Info,
    }
}

fn reasons(results: &[survey::CheckResult], sample: &str, test: &str) -> Vec<&'static str> {
    results
        .iter()
        .filter(|r| r.sample == sample && r.test == test)
        .map(|r| r.reason)
        .collect()
}

#[test]
fn test_inconsistent_and_low_are_exclusive() -> Result<()> {
    let tmp = TempDir::new()?;
    survey_outputs(tmp.path())?;
    let sheet = Samplesheet::from_csv_reader(SHEET.as_bytes())?;

    let eval = evaluate(&sheet, tmp.path(), &Thresholds::default(), false);
    assert_eq!(eval.results.len(), 12);
    assert_eq!(eval.passing, vec!["GOOD"]);

    assert_eq!(reasons(&eval.results, "UNEVEN", "reads"), vec![REASON_INCONSISTENT]);
    assert_eq!(reasons(&eval.results, "FEW", "reads"), vec![REASON_LOW]);

    assert_eq!(reasons(&eval.results, "SINGLE", "kmer"), vec![REASON_MISSING]);
    assert_eq!(reasons(&eval.results, "SINGLE", "assembly"), vec![REASON_SMALL]);
    let single_kmer = eval.results.iter().find(|r| r.sample == "SINGLE" && r.test == "kmer").unwrap();
    assert!(single_kmer.passed());

    let forced = evaluate(&sheet, tmp.path(), &Thresholds::default(), true);
    assert_eq!(forced.passing.len(), 4);
    assert_eq!(forced.results, eval.results);
    Ok(())
}

#[tokio::test]
async fn test_survey_stage_report_only() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("samples.csv");
    fs::write(&input, SHEET)?;
    let config = run_config(tmp.path(), Stage::Survey, &input);
    let out = config.out_dir.clone();
    survey_outputs(&out)?;

    survey::run(Arc::new(config)).await?;

    assert!(out.join("config").join("survey.yaml").exists());
    let report = read_tsv(&out.join("reports").join("survey_report.tsv"), false)?;
    assert_eq!(report.header, vec!["sample", "test", "status", "reason", "data"]);
    assert_eq!(report.rows.len(), 12);
    assert_eq!(report.rows[0], vec!["GOOD", "reads", "PASS", "OK", "250000"]);
    assert_eq!(report.rows[1], vec!["GOOD", "kmer", "PASS", "OK", "2;0.9500"]);

    let next = Samplesheet::from_path(&out.join("assembly_samplesheet.csv"))?;
    assert_eq!(next.ids(), vec!["GOOD"]);
    let good = next.get("GOOD").unwrap();
    assert_eq!(good.stage(), SampleStage::Normalized);
    assert_eq!(good.norm_r2, Some(SampleLayout::new(&out, "GOOD").normalized(Mate::R2)));
    Ok(())
}

#[tokio::test]
async fn test_empty_samplesheet_is_an_error() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("samples.csv");
    fs::write(&input, "#sample_id,alias,r1\n")?;
    let result = survey::run(Arc::new(run_config(tmp.path(), Stage::Survey, &input))).await;
    assert!(matches!(result, Err(PipelineError::Samplesheet(_))));
    Ok(())
}

#[tokio::test]
async fn test_assemble_then_package() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("assembly_samplesheet.csv");
    fs::write(&input, "A,a,/r/A_1.fq,/r/A_2.fq\nB,b,/r/B_1.fq,/r/B_2.fq\nC,c,/r/C_1.fq,/r/C_2.fq\n")?;

    let mut config = run_config(tmp.path(), Stage::Assemble, &input);
    config.args.enterobase_group = Some("Salmonella".to_string());
    let out = config.out_dir.clone();

    let header = "Assembly\t# contigs\tTotal length\tN50\t# N's per 100 kbp";
    for (id, length, genus, assembled) in [
        ("A", 4_800_000, "Salmonella", true),
        ("B", 3_000_000, "Salmonella", true),
        ("C", 4_800_000, "Salmonella", false),
    ] {
        let layout = SampleLayout::new(&out, id);
        write_file(&layout.quast_report(), &format!("{}\ncontigs\t90\t{}\t70000\t0.00\n", header, length))?;
        write_file(
            &layout.blobtools_table(),
            &format!("# name\tlength\tgenus.t.6\ncontig_1\t{}\t{}\n", length, genus),
        )?;
        if assembled {
            write_file(&layout.assembly(), &format!(">{}_contig_1\nACGT\n", id))?;
        }
    }

    assemble::run(Arc::new(config)).await?;

    let reports = out.join("reports");
    assert_eq!(read_tsv(&reports.join("assembly_quast.tsv"), false)?.rows.len(), 3);
    assert!(reports.join("assembly_blobtools.tsv").exists());
    assert!(!reports.join("assembly_busco.tsv").exists());
    // C passes the filter but has no assembly on disk
    assert_eq!(fs::read_to_string(reports.join("enterobase_Salmonella.txt"))?, "A\nC\n");

    let next_sheet = out.join("annotation_samplesheet.csv");
    let next = Samplesheet::from_path(&next_sheet)?;
    assert_eq!(next.ids(), vec!["A", "B"]);
    assert_eq!(next.get("A").unwrap().stage(), SampleStage::Assembled);

    let mut config = run_config(tmp.path(), Stage::Package, &next_sheet);
    config.args.enterobase_group = Some("Salmonella".to_string());
    config.args.package_stages = vec![PackageStage::Assembly];
    package::run(Arc::new(config)).await?;

    let package_dir = out.join("package").join("bacasm_Salmonella_assembly");
    assert!(package_dir.join("A").join("A.fasta").exists());
    assert!(!package_dir.join("B").exists());
    let tarball: PathBuf = out.join("package").join("bacasm_Salmonella_assembly.tar.gz");
    assert!(tarball.exists());
    assert!(out.join("package").join("bacasm_Salmonella_assembly.tar.gz.md5").exists());
    Ok(())
}

#[tokio::test]
async fn test_package_requires_pass_list() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("samples.csv");
    fs::write(&input, "A,a,/r/A.fq\n")?;
    let mut config = run_config(tmp.path(), Stage::Package, &input);
    config.args.enterobase_group = Some("Vibrio".to_string());
    let result = package::run(Arc::new(config)).await;
    assert!(matches!(result, Err(PipelineError::MissingInput(_))));
    Ok(())
}

const PROKKA_GFF: &str = "##gff-version 3
##sequence-region A_contig_1 1 4000
A_contig_1\tProdigal:002006\tgene\t100\t399\t.\t+\t.\tID=A_00001_gene;locus_tag=A_00001
A_contig_1\tProdigal:002006\tCDS\t100\t399\t.\t+\t0\tID=A_00001;locus_tag=A_00001
A_contig_1\tAragorn:001002\ttRNA\t1000\t1075\t.\t-\t.\tID=A_00002;locus_tag=A_00002
##FASTA
>A_contig_1
ACGT
";

#[tokio::test]
async fn test_annotate_stage_report_only() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("annotation_samplesheet.csv");
    fs::write(&input, "A,a,/r/A_1.fq,/r/A_2.fq\nB,b,/r/B_1.fq,/r/B_2.fq\nC,c,/r/C_1.fq,/r/C_2.fq\n")?;

    let mut config = run_config(tmp.path(), Stage::Annotate, &input);
    config.workflow.run_ratt = true;
    let out = config.out_dir.clone();

    // A has Prokka only, B has RATT only, C has a broken Prokka GFF
    write_file(&SampleLayout::new(&out, "A").prokka("gff"), PROKKA_GFF)?;
    let b = SampleLayout::new(&out, "B");
    write_file(&b.ratt_reference_gff(), PROKKA_GFF)?;
    write_file(
        &b.ratt_gff(),
        "##gff-version 3\nB_contig_1\tRATT\tCDS\t100\t399\t.\t+\t0\tID=A_00001\n",
    )?;
    write_file(&SampleLayout::new(&out, "C").prokka("gff"), "C_contig_1\tProdigal\tCDS\n")?;

    annotate::run(Arc::new(config)).await?;

    let reports = out.join("reports");
    let prokka = read_tsv(&reports.join("annotation_prokka.tsv"), false)?;
    assert_eq!(prokka.rows.len(), 2);
    assert_eq!(prokka.rows[0], vec!["A", "1", "4000", "1", "0", "1", "0", "0"]);
    assert_eq!(prokka.rows[1][0], "C");
    assert!(prokka.rows[1][1..].iter().all(|c| c == "NA"));

    let ratt = read_tsv(&reports.join("annotation_ratt.tsv"), false)?;
    assert_eq!(ratt.rows, vec![vec!["B", "2", "1", "50.00"]]);

    // no sample has both annotations, so nothing is compared
    assert!(!reports.join("annotation_compare.tsv").exists());

    let next = Samplesheet::from_path(&out.join("package_samplesheet.csv"))?;
    assert_eq!(next.ids(), vec!["A", "B", "C"]);
    let a = next.get("A").unwrap();
    assert_eq!(a.stage(), SampleStage::Annotated);
    assert_eq!(a.ann_faa, Some(SampleLayout::new(&out, "A").prokka("faa")));
    Ok(())
}

#[tokio::test]
async fn test_package_rerun_with_shorter_pass_list() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("package_samplesheet.csv");
    fs::write(&input, "A,a,/r/A_1.fq,/r/A_2.fq\nB,b,/r/B_1.fq,/r/B_2.fq\n")?;
    let out = tmp.path().join("run");
    for id in ["A", "B"] {
        write_file(&SampleLayout::new(&out, id).assembly(), &format!(">{}_contig_1\nACGT\n", id))?;
    }
    let pass_list = out.join("reports").join("enterobase_Salmonella.txt");
    write_file(&pass_list, "A\nB\n")?;

    let package_config = || {
        let mut config = run_config(tmp.path(), Stage::Package, &input);
        config.args.enterobase_group = Some("Salmonella".to_string());
        Arc::new(config)
    };
    package::run(package_config()).await?;
    let package_dir = out.join("package").join("bacasm_Salmonella_assembly");
    assert!(package_dir.join("B").join("B.fasta").exists());

    write_file(&pass_list, "A\n")?;
    fs::remove_file(SampleLayout::new(&out, "B").assembly())?;
    package::run(package_config()).await?;

    assert!(package_dir.join("A").join("A.fasta").exists());
    assert!(!package_dir.join("B").exists());
    assert!(out.join("package").join("bacasm_Salmonella_assembly.tar.gz").exists());
    Ok(())
}
