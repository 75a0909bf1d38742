pub mod asmstats;
pub mod blobtools;
pub mod busco;
pub mod command;
pub mod enterobase;
pub mod fastqc;
pub mod file;
pub mod gff;
pub mod kat;
pub mod layout;
pub mod quast;
pub mod samplesheet;
pub mod streams;
pub mod system;
