#[derive(Debug, Default)]
pub struct Stats {
    n_statement_rows: i32,
    n_skipped_rows: i32,
}

impl Stats {
    pub fn inc_statement_rows(&mut self) {
        self.n_statement_rows += 1;
    }

    pub fn inc_skipped_rows(&mut self) {
        self.n_skipped_rows += 1;
    }

    pub fn pretty_print(&self) {
        println!("{self:#?}");
        println!();
    }
}
