use anyhow::Context;
use clap::{Parser, Subcommand};
use perfrepo_app::{
    ExecutionService, GroupReportEditor, GroupReportUseCase, ReportService, SystemClock,
    TestService, render_markdown,
};
use perfrepo_error::ServiceError;
use perfrepo_report::{DEFAULT_COMPARISON_THRESHOLD, ReportConfig};
use perfrepo_store::{ExecutionSearchCriteria, LastWindow, ParamCriterion, Repository};
use perfrepo_types::{
    AccessLevel, AccessType, ConfigFile, DefaultsConfig, Direction, ExecutionId, GroupFilter,
    MeasuredValue, Metric, NewExecution, NewTest, Parameter, Permission, ReportId,
    SessionContext, Snapshot,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use time::OffsetDateTime;

const EXIT_TOOL: u8 = 1;
const EXIT_INVALID: u8 = 2;
const EXIT_FORBIDDEN: u8 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "perfrepo",
    version,
    about = "Performance test repository: tests, executions, search, and group reports"
)]
struct Cli {
    /// Repository snapshot file [default: perfrepo.json]
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Acting user [default: anonymous]
    #[arg(long, global = true)]
    user: Option<String>,

    /// Groups the user belongs to (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    groups: Vec<String>,

    /// Session defaults file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage tests.
    #[command(subcommand)]
    Test(TestCommand),

    /// Manage metrics declared on tests.
    #[command(subcommand)]
    Metric(MetricCommand),

    /// Record, inspect, and search executions.
    #[command(subcommand)]
    Exec(ExecCommand),

    /// Group reports over stored executions.
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Debug, Subcommand)]
enum TestCommand {
    /// Create a test in one of your groups.
    Create {
        /// Unique test identifier
        #[arg(long)]
        uid: String,

        #[arg(long)]
        name: String,

        /// Owning group
        #[arg(long)]
        group: String,

        #[arg(long)]
        description: Option<String>,

        /// Metric definition NAME:higher|lower. Repeatable.
        #[arg(long = "metric", value_parser = parse_metric_spec)]
        metrics: Vec<(String, Direction)>,
    },

    /// Print one test as JSON.
    Show { uid: String },

    /// List tests as JSON.
    List {
        /// Only tests owned by your groups
        #[arg(long, default_value_t = false)]
        mine: bool,
    },

    /// Delete a test and every execution recorded against it.
    Delete { uid: String },
}

#[derive(Debug, Subcommand)]
enum MetricCommand {
    /// Declare another metric on an existing test.
    Add {
        /// Test UID
        #[arg(long)]
        test: String,

        #[arg(long)]
        name: String,

        /// higher or lower
        #[arg(long, default_value = "higher")]
        direction: Direction,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ExecCommand {
    /// Record an execution against an existing test.
    Add {
        /// Test UID
        #[arg(long)]
        test: String,

        #[arg(long)]
        name: String,

        /// Start timestamp (RFC 3339); defaults to now
        #[arg(long, value_parser = parse_timestamp)]
        started: Option<OffsetDateTime>,

        #[arg(long)]
        comment: Option<String>,

        /// Tag on this execution. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Execution parameter NAME=VALUE. Repeatable.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Measured value METRIC=RESULT. Repeatable.
        #[arg(long = "value", value_parser = parse_value_spec)]
        values: Vec<(String, f64)>,
    },

    /// Print one execution with its test as JSON.
    Show { id: u64 },

    /// List executions of a test, oldest first.
    List {
        /// Test UID
        #[arg(long)]
        test: String,
    },

    /// Delete an execution.
    Delete { id: u64 },

    /// Search executions by criteria.
    Search {
        /// Tag expression, e.g. "nightly -broken"
        #[arg(long)]
        tags: Option<String>,

        /// Test name; a trailing * makes it a prefix match
        #[arg(long)]
        test_name: Option<String>,

        /// Test UID; a trailing * makes it a prefix match
        #[arg(long)]
        test_uid: Option<String>,

        /// Keep executions started at or after this instant (RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        from: Option<OffsetDateTime>,

        /// Keep executions started at or before this instant (RFC 3339)
        #[arg(long, value_parser = parse_timestamp)]
        to: Option<OffsetDateTime>,

        /// Only tests owned by your groups
        #[arg(long, default_value_t = false)]
        mine: bool,

        /// Parameter criterion NAME or NAME=PATTERN (% and _ wildcards;
        /// a bare name or empty pattern matches any value). Repeatable.
        #[arg(long = "param", value_parser = parse_param_criterion)]
        params: Vec<(String, Option<String>)>,

        /// Attach this parameter to the results. Repeatable.
        #[arg(long = "show-param")]
        show_params: Vec<String>,

        /// Take only this many of the newest matches
        #[arg(long)]
        last: Option<usize>,

        /// Start the window this many executions back from the newest
        #[arg(long)]
        offset: Option<usize>,
    },

    /// Data points for one metric of a test, newest first.
    History {
        /// Test UID
        #[arg(long)]
        test: String,

        #[arg(long)]
        metric: String,

        /// Required tag (exact match). Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
enum ReportCommand {
    /// Create a group report.
    Create {
        #[arg(long)]
        name: String,

        /// Test UID shown in the report. Repeatable.
        #[arg(long = "test")]
        tests: Vec<String>,

        /// Tag column, e.g. "16 nightly". Repeatable.
        #[arg(long = "tags")]
        tags: Vec<String>,

        /// Comparison LEFT|RIGHT between two columns. Repeatable.
        #[arg(long = "compare", value_parser = parse_compare)]
        compares: Vec<(String, String)>,

        /// Metrics shown in the report (comma-separated; empty means all)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,

        /// Grant access: read:public, write:group:NAME, read:user:NAME.
        /// Repeatable.
        #[arg(long = "permission", value_parser = parse_permission)]
        permissions: Vec<Permission>,
    },

    /// Evaluate a report and render it.
    Show {
        id: u64,

        /// Emit the evaluated view as JSON instead of Markdown
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Red/orange boundary in percent
        #[arg(long, allow_hyphen_values = true)]
        threshold: Option<f64>,
    },

    /// List reports you can read.
    List,

    /// Delete a report.
    Delete { id: u64 },

    /// Edit a stored report's configuration.
    Edit {
        id: u64,

        /// New report name
        #[arg(long)]
        rename: Option<String>,

        /// Repeatable.
        #[arg(long = "add-test")]
        add_tests: Vec<String>,

        /// Repeatable.
        #[arg(long = "remove-test")]
        remove_tests: Vec<String>,

        /// Tag column to add, e.g. "32 nightly". Repeatable.
        #[arg(long = "add-tags")]
        add_tags: Vec<String>,

        /// Tag column to remove, by label. Repeatable.
        #[arg(long = "remove-tags")]
        remove_tags: Vec<String>,

        /// Alias a column: LABEL=ALIAS. Repeatable.
        #[arg(long = "set-alias", value_parser = parse_key_val)]
        set_aliases: Vec<(String, String)>,

        /// Drop the alias from a column. Repeatable.
        #[arg(long = "clear-alias")]
        clear_aliases: Vec<String>,

        /// Add a comparison LEFT|RIGHT. Repeatable.
        #[arg(long = "add-compare", value_parser = parse_compare)]
        add_compares: Vec<(String, String)>,

        /// Remove a comparison by its display label. Repeatable.
        #[arg(long = "remove-compare")]
        remove_compares: Vec<String>,

        /// Replace the metric selection (comma-separated)
        #[arg(long, value_delimiter = ',')]
        set_metrics: Option<Vec<String>>,

        /// Replace the permission list. Repeatable.
        #[arg(long = "permission", value_parser = parse_permission)]
        permissions: Vec<Permission>,
    },
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<perfrepo_error::Error>() {
            return match e {
                perfrepo_error::Error::Security(_) => EXIT_FORBIDDEN,
                perfrepo_error::Error::Service(_) => EXIT_INVALID,
                perfrepo_error::Error::Store(_) => EXIT_TOOL,
            };
        }
        if cause.downcast_ref::<perfrepo_error::SecurityError>().is_some() {
            return EXIT_FORBIDDEN;
        }
        if cause.downcast_ref::<ServiceError>().is_some() {
            return EXIT_INVALID;
        }
    }
    EXIT_TOOL
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let defaults = load_defaults(cli.config.as_deref())?;

    let path = cli
        .repo
        .clone()
        .or_else(|| defaults.repository.as_deref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("perfrepo.json"));
    let username = cli
        .user
        .clone()
        .or_else(|| defaults.user.clone())
        .unwrap_or_else(|| "anonymous".to_string());
    let groups = if cli.groups.is_empty() {
        defaults.groups.clone()
    } else {
        cli.groups.clone()
    };

    let app = App {
        repo: load_repository(&path)?,
        path,
        session: SessionContext::new(username, groups),
        pretty: cli.pretty,
        threshold: defaults
            .comparison_threshold
            .unwrap_or(DEFAULT_COMPARISON_THRESHOLD),
    };

    match cli.cmd {
        Command::Test(cmd) => run_test(&app, cmd),
        Command::Metric(cmd) => run_metric(&app, cmd),
        Command::Exec(cmd) => run_exec(&app, cmd),
        Command::Report(cmd) => run_report(&app, cmd),
    }
}

struct App {
    repo: Repository,
    path: PathBuf,
    session: SessionContext,
    pretty: bool,
    threshold: f64,
}

impl App {
    fn persist(&self) -> anyhow::Result<()> {
        let snapshot = self.repo.snapshot()?;
        write_json(&self.path, &snapshot)
    }
}

fn run_test(app: &App, cmd: TestCommand) -> anyhow::Result<()> {
    let service = TestService::new(app.repo.clone());
    match cmd {
        TestCommand::Create {
            uid,
            name,
            group,
            description,
            metrics,
        } => {
            let metrics = metrics
                .into_iter()
                .map(|(name, direction)| Metric {
                    name,
                    direction,
                    description: None,
                })
                .collect();
            let test = service.create_test(
                &app.session,
                NewTest {
                    uid,
                    name,
                    group,
                    description,
                    metrics,
                },
            )?;
            app.persist()?;
            print_json(&test, app.pretty)
        }
        TestCommand::Show { uid } => {
            let test = service
                .get_test_by_uid(&uid)?
                .ok_or(ServiceError::UnknownTest { uid })?;
            print_json(&test, app.pretty)
        }
        TestCommand::List { mine } => {
            let filter = if mine {
                GroupFilter::MyGroups
            } else {
                GroupFilter::AllGroups
            };
            print_json(&service.list_tests(&app.session, filter)?, app.pretty)
        }
        TestCommand::Delete { uid } => {
            let test = service.delete_test(&app.session, &uid)?;
            app.persist()?;
            print_json(&test, app.pretty)
        }
    }
}

fn run_metric(app: &App, cmd: MetricCommand) -> anyhow::Result<()> {
    let service = TestService::new(app.repo.clone());
    match cmd {
        MetricCommand::Add {
            test,
            name,
            direction,
            description,
        } => {
            let updated = service.add_metric(
                &app.session,
                &test,
                Metric {
                    name,
                    direction,
                    description,
                },
            )?;
            app.persist()?;
            print_json(&updated, app.pretty)
        }
    }
}

fn run_exec(app: &App, cmd: ExecCommand) -> anyhow::Result<()> {
    let service = ExecutionService::new(app.repo.clone(), SystemClock);
    match cmd {
        ExecCommand::Add {
            test,
            name,
            started,
            comment,
            tags,
            params,
            values,
        } => {
            let execution = service.create_execution(
                &app.session,
                NewExecution {
                    test_uid: test,
                    name,
                    started,
                    comment,
                    tags,
                    parameters: params
                        .into_iter()
                        .map(|(name, value)| Parameter { name, value })
                        .collect(),
                    values: values
                        .into_iter()
                        .map(|(metric, result)| MeasuredValue {
                            metric,
                            result,
                            parameters: BTreeMap::new(),
                        })
                        .collect(),
                },
            )?;
            app.persist()?;
            print_json(&execution, app.pretty)
        }
        ExecCommand::Show { id } => {
            let detail = service
                .get_execution(ExecutionId(id))?
                .ok_or(ServiceError::UnknownExecution { id })?;
            print_json(&detail, app.pretty)
        }
        ExecCommand::List { test } => print_json(&service.list_for_test(&test)?, app.pretty),
        ExecCommand::Delete { id } => {
            let removed = service.delete_execution(&app.session, ExecutionId(id))?;
            app.persist()?;
            print_json(&removed, app.pretty)
        }
        ExecCommand::Search {
            tags,
            test_name,
            test_uid,
            from,
            to,
            mine,
            params,
            show_params,
            last,
            offset,
        } => {
            let criteria = ExecutionSearchCriteria {
                started_from: from,
                started_to: to,
                tag_query: tags,
                test_name,
                test_uid,
                group_filter: if mine {
                    GroupFilter::MyGroups
                } else {
                    GroupFilter::AllGroups
                },
                parameters: param_criteria(params, show_params),
            };
            let found = match last {
                Some(how_many) => service.search_last(
                    &criteria,
                    LastWindow {
                        last_from: offset.unwrap_or(how_many),
                        how_many,
                    },
                    &app.session,
                )?,
                None => service.search(&criteria, &app.session)?,
            };
            print_json(&found, app.pretty)
        }
        ExecCommand::History {
            test,
            metric,
            tags,
            limit,
        } => {
            let points = service.metric_history(&test, &metric, &tags, limit)?;
            print_json(&points, app.pretty)
        }
    }
}

fn run_report(app: &App, cmd: ReportCommand) -> anyhow::Result<()> {
    match cmd {
        ReportCommand::Create {
            name,
            tests,
            tags,
            compares,
            metrics,
            permissions,
        } => {
            let mut editor = GroupReportEditor::begin(app.repo.clone(), ReportConfig::default());
            for uid in tests {
                editor.add_test(&uid)?;
            }
            for raw in tags {
                editor.add_tags(&raw);
            }
            for (left, right) in compares {
                editor.add_comparison(&left, &right);
            }
            editor.set_metrics(metrics);
            let config = editor.commit();

            let use_case = GroupReportUseCase::new(app.repo.clone());
            let report = use_case.save(&app.session, &name, &config, permissions, None)?;
            app.persist()?;
            print_json(&report, app.pretty)
        }
        ReportCommand::Show {
            id,
            json,
            threshold,
        } => {
            let use_case = GroupReportUseCase::new(app.repo.clone())
                .with_threshold(threshold.unwrap_or(app.threshold));
            let view = use_case.load(&app.session, ReportId(id))?;
            if json {
                print_json(&view, app.pretty)
            } else {
                print!("{}", render_markdown(&view));
                Ok(())
            }
        }
        ReportCommand::List => {
            let service = ReportService::new(app.repo.clone());
            print_json(&service.list_reports(&app.session)?, app.pretty)
        }
        ReportCommand::Delete { id } => {
            let service = ReportService::new(app.repo.clone());
            let removed = service.delete_report(&app.session, ReportId(id))?;
            app.persist()?;
            print_json(&removed, app.pretty)
        }
        ReportCommand::Edit {
            id,
            rename,
            add_tests,
            remove_tests,
            add_tags,
            remove_tags,
            set_aliases,
            clear_aliases,
            add_compares,
            remove_compares,
            set_metrics,
            permissions,
        } => {
            let service = ReportService::new(app.repo.clone());
            let report = service
                .get_report(&app.session, ReportId(id))?
                .ok_or(ServiceError::UnknownReport { id })?;

            let mut editor = GroupReportEditor::begin(
                app.repo.clone(),
                ReportConfig::decode(&report.properties),
            );
            for uid in add_tests {
                editor.add_test(&uid)?;
            }
            for uid in remove_tests {
                editor.remove_test(&uid);
            }
            for raw in add_tags {
                editor.add_tags(&raw);
            }
            for label in remove_tags {
                editor.remove_tags(&label);
            }
            for (label, alias) in set_aliases {
                editor.set_tag_alias(&label, Some(alias));
            }
            for label in clear_aliases {
                editor.set_tag_alias(&label, None);
            }
            for (left, right) in add_compares {
                editor.add_comparison(&left, &right);
            }
            for label in remove_compares {
                editor.remove_comparison(&label);
            }
            if let Some(metrics) = set_metrics {
                editor.set_metrics(metrics);
            }
            let config = editor.commit();

            let name = rename.unwrap_or(report.name);
            let permissions = if permissions.is_empty() {
                report.permissions
            } else {
                permissions
            };
            let use_case = GroupReportUseCase::new(app.repo.clone());
            let updated =
                use_case.save(&app.session, &name, &config, permissions, Some(ReportId(id)))?;
            app.persist()?;
            print_json(&updated, app.pretty)
        }
    }
}

// ----------------------------
// Session defaults and persistence
// ----------------------------

fn load_defaults(path: Option<&Path>) -> anyhow::Result<DefaultsConfig> {
    let Some(path) = path else {
        return Ok(DefaultsConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let file: ConfigFile =
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
    Ok(file.defaults)
}

fn load_repository(path: &Path) -> anyhow::Result<Repository> {
    if !path.exists() {
        return Ok(Repository::new());
    }
    let snapshot: Snapshot = read_json(path)?;
    let repo = Repository::from_snapshot(snapshot)
        .with_context(|| format!("load repository {}", path.display()))?;
    Ok(repo)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = parent.to_path_buf();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

// ----------------------------
// Flag value parsers
// ----------------------------

fn parse_metric_spec(s: &str) -> Result<(String, Direction), String> {
    let (name, direction) = s
        .split_once(':')
        .ok_or_else(|| "expected NAME:higher|lower".to_string())?;
    if name.is_empty() {
        return Err("metric name must not be empty".to_string());
    }
    let direction: Direction = direction
        .parse()
        .map_err(|_| format!("invalid direction: {direction} (expected higher|lower)"))?;
    Ok((name.to_string(), direction))
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| "expected KEY=VALUE".to_string())?;
    Ok((k.to_string(), v.to_string()))
}

fn parse_timestamp(s: &str) -> Result<OffsetDateTime, String> {
    use time::format_description::well_known::Rfc3339;

    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }
    // A bare date means midnight UTC at the start of that day.
    let date = time::Date::parse(s, time::macros::format_description!("[year]-[month]-[day]"))
        .map_err(|_| format!("invalid timestamp: {s} (expected RFC 3339 or YYYY-MM-DD)"))?;
    Ok(date.with_time(time::Time::MIDNIGHT).assume_utc())
}

fn parse_value_spec(s: &str) -> Result<(String, f64), String> {
    let (metric, value) = s
        .split_once('=')
        .ok_or_else(|| "expected METRIC=RESULT".to_string())?;
    let result: f64 = value
        .parse()
        .map_err(|_| format!("invalid result value: {value}"))?;
    Ok((metric.to_string(), result))
}

fn parse_param_criterion(s: &str) -> Result<(String, Option<String>), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => {
            Ok((name.to_string(), Some(value.to_string())))
        }
        None if !s.is_empty() => Ok((s.to_string(), None)),
        _ => Err("expected NAME or NAME=PATTERN".to_string()),
    }
}

fn parse_compare(s: &str) -> Result<(String, String), String> {
    let (left, right) = s
        .split_once('|')
        .ok_or_else(|| "expected LEFT|RIGHT".to_string())?;
    Ok((left.to_string(), right.to_string()))
}

fn parse_permission(s: &str) -> Result<Permission, String> {
    let mut parts = s.splitn(3, ':');
    let access_type = match parts.next() {
        Some("read") => AccessType::Read,
        Some("write") => AccessType::Write,
        _ => return Err(format!("expected read:... or write:... in `{s}`")),
    };
    match (parts.next(), parts.next()) {
        (Some("public"), None) => Ok(Permission {
            access_type,
            level: AccessLevel::Public,
            user: None,
            group: None,
        }),
        (Some("user"), Some(name)) if !name.is_empty() => Ok(Permission {
            access_type,
            level: AccessLevel::User,
            user: Some(name.to_string()),
            group: None,
        }),
        (Some("group"), Some(name)) if !name.is_empty() => Ok(Permission {
            access_type,
            level: AccessLevel::Group,
            user: None,
            group: Some(name.to_string()),
        }),
        _ => Err(format!(
            "expected public, user:NAME, or group:NAME after the access type in `{s}`"
        )),
    }
}

fn param_criteria(
    params: Vec<(String, Option<String>)>,
    show_params: Vec<String>,
) -> Vec<ParamCriterion> {
    let mut criteria: Vec<ParamCriterion> = params
        .into_iter()
        .map(|(name, value)| ParamCriterion {
            name,
            value,
            displayed: false,
        })
        .collect();
    for name in show_params {
        match criteria.iter_mut().find(|c| c.name == name) {
            Some(criterion) => criterion.displayed = true,
            None => criteria.push(ParamCriterion {
                name,
                value: None,
                displayed: true,
            }),
        }
    }
    criteria
}
