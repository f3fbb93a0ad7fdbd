mod dataset;
mod page;
mod run;

pub use dataset::count_dataset_rows;
pub use run::run;
