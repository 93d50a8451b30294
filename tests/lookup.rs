mod common;

use common::{TestWorkspace, column_values, empty, n, s};
use erp_sheet_tools::data::CellValue;
use erp_sheet_tools::lookup::{
    ApplyOptions, EmptyOrKeep, FieldRange, Highlight, LookupTable, NoMatchAction, PolicyFns,
    ReplaceWithLookup, SmapJob, apply,
};
use erp_sheet_tools::workbook::{Cell, Workbook};

fn lookup_sheet() -> Vec<Vec<CellValue>> {
    vec![
        vec![s("key"), s("value")],
        vec![s("K1"), s("V1")],
        vec![s("K2"), s("V2")],
    ]
}

fn target_sheet() -> Vec<Vec<CellValue>> {
    vec![
        vec![s("title row")],
        vec![s("id"), s("field")],
        vec![n(1.0), s("K1")],
        vec![n(2.0), s("K9")],
    ]
}

fn job(workspace: &TestWorkspace, no_header_match: bool) -> SmapJob {
    let target = workspace.write_workbook("orders.xlsx", &[("Orders", target_sheet())]);
    let lookup = workspace.write_workbook("codes.xlsx", &[("Codes", lookup_sheet())]);
    let field = if no_header_match { "missing" } else { "field" };
    SmapJob {
        target,
        lookup,
        lookup_sheet: None,
        fields: vec![FieldRange::parse(field, "A2:B3").expect("field range")],
        options: ApplyOptions {
            header_row: 2,
            ..ApplyOptions::default()
        },
        suffix: "_processed".to_string(),
    }
}

#[test]
fn smap_replaces_matches_and_clears_misses() {
    let workspace = TestWorkspace::new();
    let job = job(&workspace, false);

    let outcome = job
        .run(&mut EmptyOrKeep::new(NoMatchAction::Empty))
        .expect("smap run");

    assert_eq!(outcome.output, workspace.join("orders_processed.xlsx"));
    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.summary.unmatched, 1);
    assert_eq!(
        column_values(&outcome.output, "Orders", 2, "field"),
        vec![s("V1"), empty()]
    );
}

#[test]
fn smap_keep_policy_leaves_unmatched_values() {
    let workspace = TestWorkspace::new();
    let job = job(&workspace, false);

    let outcome = job
        .run(&mut EmptyOrKeep::new(NoMatchAction::Keep))
        .expect("smap run");

    assert_eq!(
        column_values(&outcome.output, "Orders", 2, "field"),
        vec![s("V1"), s("K9")]
    );
}

#[test]
fn smap_leaves_the_target_file_untouched() {
    let workspace = TestWorkspace::new();
    let job = job(&workspace, false);
    let before = std::fs::read(&job.target).expect("read target");

    job.run(&mut ReplaceWithLookup).expect("smap run");

    let after = std::fs::read(&job.target).expect("read target");
    assert_eq!(before, after);
    assert_eq!(
        column_values(&job.target, "Orders", 2, "field"),
        vec![s("K1"), s("K9")]
    );
}

#[test]
fn smap_missing_header_is_not_an_error() {
    let workspace = TestWorkspace::new();
    let job = job(&workspace, true);

    let outcome = job.run(&mut ReplaceWithLookup).expect("smap run");

    assert_eq!(outcome.summary.columns, 0);
    assert_eq!(outcome.summary.matched, 0);
    assert_eq!(
        column_values(&outcome.output, "Orders", 2, "field"),
        vec![s("K1"), s("K9")]
    );
}

#[test]
fn smap_custom_suffix_names_the_output() {
    let workspace = TestWorkspace::new();
    let mut job = job(&workspace, false);
    job.suffix = ".mapped".to_string();

    let outcome = job.run(&mut ReplaceWithLookup).expect("smap run");

    assert_eq!(outcome.output, workspace.join("orders.mapped.xlsx"));
    assert!(outcome.output.exists());
}

#[test]
fn rerunning_on_the_same_input_gives_the_same_values() {
    let workspace = TestWorkspace::new();
    let job = job(&workspace, false);

    let first = job
        .run(&mut EmptyOrKeep::new(NoMatchAction::Keep))
        .expect("first run");
    let first_values = column_values(&first.output, "Orders", 2, "field");
    let second = job
        .run(&mut EmptyOrKeep::new(NoMatchAction::Keep))
        .expect("second run");

    assert_eq!(first.summary, second.summary);
    assert_eq!(
        column_values(&second.output, "Orders", 2, "field"),
        first_values
    );
}

#[test]
fn first_occurrence_of_a_duplicate_key_wins() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Codes");
    sheet.set_value(1, 1, "K1");
    sheet.set_value(1, 2, "first");
    sheet.set_value(2, 1, "K1");
    sheet.set_value(2, 2, "second");

    let field = FieldRange::parse("field", "A1:B2").expect("field range");
    let table = LookupTable::from_sheet(workbook.first_sheet().expect("sheet"), &[field]);

    assert_eq!(table.get("field", &s("K1")), Some(&s("first")));
    assert_eq!(table.key_count("field"), 1);
}

#[test]
fn matching_is_type_sensitive() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Codes");
    sheet.set_value(1, 1, 5.0);
    sheet.set_value(1, 2, "number five");

    let field = FieldRange::parse("field", "A1:B1").expect("field range");
    let table = LookupTable::from_sheet(workbook.first_sheet().expect("sheet"), &[field]);

    assert_eq!(table.get("field", &n(5.0)), Some(&s("number five")));
    assert_eq!(table.get("field", &s("5")), None);
}

#[test]
fn empty_keys_and_empty_values_never_match() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Codes");
    sheet.set_value(1, 2, "orphan");
    sheet.set_value(2, 1, "K1");

    let field = FieldRange::parse("field", "A1:B2").expect("field range");
    let table = LookupTable::from_sheet(workbook.first_sheet().expect("sheet"), &[field]);

    assert_eq!(table.get("field", &empty()), None);
    assert_eq!(table.get("field", &s("K1")), None);
}

#[test]
fn lookup_ranges_need_two_columns() {
    let err = FieldRange::parse("field", "A1:A5").unwrap_err();
    assert!(err.to_string().contains("key column and a value column"));
}

fn target_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    for name in ["North", "South"] {
        let sheet = workbook.add_sheet(name);
        sheet.set_value(1, 1, "field");
        sheet.set_value(2, 1, "K1");
        sheet.set_value(3, 1, "K2");
    }
    workbook
}

fn lookup_table() -> LookupTable {
    let mut source = Workbook::new();
    let sheet = source.add_sheet("Codes");
    sheet.set_value(1, 1, "K1");
    sheet.set_value(1, 2, "V1");
    let field = FieldRange::parse("field", "A1:B1").expect("field range");
    LookupTable::from_sheet(source.first_sheet().expect("sheet"), &[field])
}

#[test]
fn apply_restricts_to_named_sheets_and_skips_unknown_ones() {
    let mut workbook = target_workbook();
    let options = ApplyOptions {
        sheets: vec!["South".to_string(), "Nowhere".to_string()],
        ..ApplyOptions::default()
    };

    let summary = apply(
        &mut workbook,
        &lookup_table(),
        &options,
        &mut EmptyOrKeep::default(),
    )
    .expect("apply");

    assert_eq!(summary.sheets, 1);
    let north = workbook.sheet("North").expect("north");
    let south = workbook.sheet("South").expect("south");
    assert_eq!(north.value(2, 1), &s("K1"));
    assert_eq!(south.value(2, 1), &s("V1"));
    assert_eq!(south.value(3, 1), &empty());
}

#[test]
fn apply_honours_skip_rows() {
    let mut workbook = target_workbook();
    let options = ApplyOptions {
        skip_rows: 1,
        sheets: vec!["North".to_string()],
        ..ApplyOptions::default()
    };

    apply(
        &mut workbook,
        &lookup_table(),
        &options,
        &mut ReplaceWithLookup,
    )
    .expect("apply");

    let north = workbook.sheet("North").expect("north");
    assert_eq!(north.value(2, 1), &s("K1"));
}

#[test]
fn apply_rejects_header_row_zero() {
    let mut workbook = target_workbook();
    let options = ApplyOptions {
        header_row: 0,
        ..ApplyOptions::default()
    };
    let err = apply(
        &mut workbook,
        &lookup_table(),
        &options,
        &mut ReplaceWithLookup,
    )
    .unwrap_err();
    assert!(err.to_string().contains("header row"));
}

#[test]
fn highlight_fills_matched_cells_without_rewriting_them() {
    let mut workbook = target_workbook();
    let mut policy = Highlight::default();

    apply(
        &mut workbook,
        &lookup_table(),
        &ApplyOptions::default(),
        &mut policy,
    )
    .expect("apply");

    let north = workbook.sheet("North").expect("north");
    let matched = north.cell(2, 1).expect("matched cell");
    assert_eq!(matched.value, s("K1"));
    assert_eq!(matched.fill.as_deref(), Some(Highlight::DEFAULT_COLOR));
    assert_eq!(north.cell(3, 1).and_then(|c| c.fill.clone()), None);
    assert_eq!(policy.matched, vec![s("K1"), s("K1")]);
    assert_eq!(policy.unmatched, vec![s("K2"), s("K2")]);
}

#[test]
fn highlight_fill_survives_a_save() {
    let workspace = TestWorkspace::new();
    let mut workbook = target_workbook();
    apply(
        &mut workbook,
        &lookup_table(),
        &ApplyOptions::default(),
        &mut Highlight::new("#00FF00"),
    )
    .expect("apply");

    let path = workspace.join("highlighted.xlsx");
    workbook.save_as(&path).expect("save");

    let reloaded = Workbook::open(&path).expect("reopen");
    assert_eq!(reloaded.sheet_names(), vec!["North", "South"]);
    assert_eq!(reloaded.sheet("North").expect("north").value(2, 1), &s("K1"));
}

#[test]
fn closure_policies_see_every_cell() {
    let mut workbook = target_workbook();
    let mut misses = 0;
    let mut policy = PolicyFns {
        on_match: |cell: &mut Cell, value: &CellValue| {
            cell.value = CellValue::from(format!("{}!", value.as_display()));
        },
        on_no_match: |_cell: &mut Cell| misses += 1,
    };

    let summary = apply(
        &mut workbook,
        &lookup_table(),
        &ApplyOptions::default(),
        &mut policy,
    )
    .expect("apply");

    assert_eq!(summary.matched, 2);
    assert_eq!(misses, 2);
    assert_eq!(
        workbook.sheet("South").expect("south").value(2, 1),
        &s("V1!")
    );
}

fn formula_target(workspace: &TestWorkspace, name: &str) -> std::path::PathBuf {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Orders");
    sheet.set_value(1, 1, "title row");
    sheet.set_value(2, 1, "field");
    sheet.set_value(2, 2, "qty");
    sheet.set_value(2, 3, "double");
    sheet.set_value(3, 1, "K1");
    sheet.set_value(3, 2, 4.0);
    sheet.set_value(3, 3, 8.0);
    sheet.set_formula(3, 3, "=B3*2");
    let path = workspace.join(name);
    workbook.save_as(&path).expect("save target");
    path
}

#[test]
fn smap_keeps_formulas_in_untouched_columns() {
    let workspace = TestWorkspace::new();
    let mut job = job(&workspace, false);
    job.target = formula_target(&workspace, "formulas.xlsx");

    let outcome = job
        .run(&mut EmptyOrKeep::new(NoMatchAction::Empty))
        .expect("smap run");

    let reloaded = Workbook::open(&outcome.output).expect("open output");
    let sheet = reloaded.sheet("Orders").expect("sheet");
    assert_eq!(sheet.value(3, 1), &s("V1"));
    let formula = sheet.cell(3, 3).and_then(|cell| cell.formula.clone());
    assert_eq!(formula.as_deref(), Some("B3*2"));
}

#[test]
fn rewritten_formula_cells_become_plain_values() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("North");
    sheet.set_value(1, 1, "field");
    sheet.set_value(2, 1, "K1");
    sheet.set_formula(2, 1, "=\"K\"&1");
    sheet.set_value(3, 1, "K7");
    sheet.set_formula(3, 1, "=\"K\"&7");

    apply(
        &mut workbook,
        &lookup_table(),
        &ApplyOptions::default(),
        &mut EmptyOrKeep::new(NoMatchAction::Keep),
    )
    .expect("apply");

    let north = workbook.sheet("North").expect("north");
    let replaced = north.cell(2, 1).expect("replaced cell");
    assert_eq!(replaced.value, s("V1"));
    assert_eq!(replaced.formula, None);
    let kept = north.cell(3, 1).expect("kept cell");
    assert_eq!(kept.formula.as_deref(), Some("\"K\"&7"));
}

#[test]
fn smap_output_is_always_xlsx() {
    let workspace = TestWorkspace::new();
    let mut job = job(&workspace, false);
    let macro_target = workspace.join("orders.xlsm");
    std::fs::copy(&job.target, &macro_target).expect("copy target");
    job.target = macro_target;

    let outcome = job.run(&mut ReplaceWithLookup).expect("smap run");

    assert_eq!(outcome.output, workspace.join("orders_processed.xlsx"));
    assert!(!workspace.join("orders_processed.xlsm").exists());
    assert_eq!(
        column_values(&outcome.output, "Orders", 2, "field"),
        vec![s("V1"), s("K9")]
    );
}
