use std::{
    io::{self, BufRead, Write},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use hotel_repair_client::{
    auth::{FileSessionStore, LoginRequest, LogoutNotice, SessionContext, SessionStore},
    client::{AdminTicketFilter, MonthlyRequestsQuery, RepairApiClient},
    config::{self, AppConfig},
    errors::ServiceError,
    models::{
        DailyStats, Department, EquipmentType, NewRepairTicket, RepairTicket, TicketStatus,
    },
    reports::{self, MonthlyReport},
    services::{
        aggregation,
        lifecycle::{self, QuickAction},
        ticket_query::{SortField, SortOrder},
        tickets::{QuickActionOutcome, TicketService},
    },
    Paginated,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let context = CliContext::initialize(cli.api_url.as_deref())?;
    let json = cli.json;

    let outcome = match cli.command {
        Commands::Create(args) => handle_create(&context, args, json).await,
        Commands::Track(args) => handle_track(&context, args, json).await,
        Commands::Cancel(args) => handle_self_cancel(&context, args, json).await,
        Commands::Admin(command) => handle_admin_command(&context, command, json).await,
        Commands::Status => handle_status(&context, json),
    };

    if let Some(notice) = context.logout_notice() {
        eprintln!(
            "เซสชันของ {} หมดอายุ กรุณาเข้าสู่ระบบใหม่ด้วย `hotel-repair admin login`",
            notice.username
        );
    }
    outcome
}

#[derive(Parser)]
#[command(
    name = "hotel-repair",
    about = "Hotel IT repair requests: report, track and triage",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[arg(long, global = true, help = "Override the backend API base URL")]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new repair request
    Create(CreateArgs),
    /// Show a request and its status history
    Track(TrackArgs),
    /// Cancel your own request while it is still pending
    Cancel(SelfCancelArgs),
    #[command(subcommand)]
    Admin(AdminCommands),
    /// Show build, configuration and session details
    Status,
}

#[derive(Subcommand)]
enum AdminCommands {
    Login(LoginArgs),
    Logout,
    /// List requests, newest first
    List(ListArgs),
    /// Set a request's status with an optional note
    Update(UpdateArgs),
    /// Start work on a pending request
    Accept(NumberArg),
    /// Mark an in-progress request as done
    Complete(NumberArg),
    /// Cancel a pending request
    Cancel(ConfirmedNumberArg),
    /// Permanently delete a cancelled request
    Delete(ConfirmedNumberArg),
    /// Daily counts
    Dashboard(DashboardArgs),
    /// Monthly statistics and request table
    Report(ReportArgs),
    /// Months that have requests on record
    Months,
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long, help = "Department, e.g. \"Front Office\", IT, HR")]
    department: Department,
    #[arg(long, help = "Computer, Printer, CCTV, UPS or Software")]
    equipment: EquipmentType,
    #[arg(long, help = "Short summary of the problem")]
    title: String,
    #[arg(long, help = "What is wrong, in detail")]
    description: String,
    #[arg(long, help = "Your name")]
    reporter: String,
    #[arg(long, help = "Where the equipment is")]
    location: Option<String>,
}

#[derive(Args)]
struct TrackArgs {
    #[arg(help = "Request number, e.g. IT-0001")]
    number: String,
}

#[derive(Args)]
struct SelfCancelArgs {
    #[arg(help = "Request number, e.g. IT-0001")]
    number: String,
    #[arg(long, short = 'y', action = ArgAction::SetTrue, help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "HOTEL_REPAIR_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<TicketStatus>,
    #[arg(long)]
    equipment: Option<EquipmentType>,
    #[arg(long)]
    department: Option<Department>,
    #[arg(long, default_value_t = 1, help = "Page number (1-indexed)")]
    page: u32,
}

#[derive(Args)]
struct UpdateArgs {
    number: String,
    #[arg(long)]
    status: TicketStatus,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct NumberArg {
    number: String,
}

#[derive(Args)]
struct ConfirmedNumberArg {
    number: String,
    #[arg(long, short = 'y', action = ArgAction::SetTrue, help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Args)]
struct DashboardArgs {
    #[arg(long, help = "Day to show (YYYY-MM-DD), defaults to today")]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: u32,
    #[arg(long)]
    year: i32,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, value_enum)]
    sort_by: Option<SortFieldArg>,
    #[arg(long, value_enum)]
    sort_order: Option<SortOrderArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortFieldArg {
    CreatedAt,
    RequestNumber,
    Department,
    EquipmentType,
    Status,
    Title,
}

impl From<SortFieldArg> for SortField {
    fn from(value: SortFieldArg) -> Self {
        match value {
            SortFieldArg::CreatedAt => SortField::CreatedAt,
            SortFieldArg::RequestNumber => SortField::RequestNumber,
            SortFieldArg::Department => SortField::Department,
            SortFieldArg::EquipmentType => SortField::EquipmentType,
            SortFieldArg::Status => SortField::Status,
            SortFieldArg::Title => SortField::Title,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortOrderArg {
    Asc,
    Desc,
}

impl From<SortOrderArg> for SortOrder {
    fn from(value: SortOrderArg) -> Self {
        match value {
            SortOrderArg::Asc => SortOrder::Asc,
            SortOrderArg::Desc => SortOrder::Desc,
        }
    }
}

struct CliContext {
    config: AppConfig,
    session_store: Option<FileSessionStore>,
    service: TicketService,
    logout_rx: watch::Receiver<Option<LogoutNotice>>,
}

impl CliContext {
    fn initialize(api_url: Option<&str>) -> Result<Self> {
        let mut config = config::load_config().context("failed to load application config")?;
        config::init_tracing(&config.log_level, config.json_logs());
        if let Some(url) = api_url {
            config.api_url = url.to_string();
        }

        let session_store = config.session_path().map(FileSessionStore::new);
        let session = match &session_store {
            Some(store) => {
                let store: Arc<dyn SessionStore> = Arc::new(store.clone());
                SessionContext::load(store).context("failed to read saved session")?
            }
            None => SessionContext::in_memory(),
        };
        let session = Arc::new(session);
        let logout_rx = session.subscribe_logout();

        let api = RepairApiClient::new(&config.api_url, session.clone())
            .context("failed to build HTTP client")?;
        let service = TicketService::new(Arc::new(api), session);
        debug!(api_url = %config.api_url, "cli initialised");

        Ok(Self {
            config,
            session_store,
            service,
            logout_rx,
        })
    }

    fn logout_notice(&self) -> Option<LogoutNotice> {
        self.logout_rx.borrow().clone()
    }
}

async fn handle_create(context: &CliContext, args: CreateArgs, json: bool) -> Result<()> {
    let draft = NewRepairTicket {
        equipment_type: args.equipment,
        department: args.department,
        title: args.title,
        problem_description: args.description,
        reporter_name: args.reporter,
        location: args.location,
    };

    let created = context.service.submit_ticket(draft).await?;

    if json {
        print_json(&created)?;
    } else {
        println!("แจ้งซ่อมสำเร็จ!");
        println!("รหัสคำขอ: {}", created.request_number);
        println!("กรุณาเก็บรหัสนี้ไว้สำหรับติดตามสถานะ");
    }
    Ok(())
}

async fn handle_track(context: &CliContext, args: TrackArgs, json: bool) -> Result<()> {
    let ticket = context.service.track_ticket(&args.number).await?;

    if json {
        print_json(&ticket)?;
    } else {
        render_ticket_detail(&ticket);
        if lifecycle::can_self_cancel(&ticket) {
            println!();
            println!("ยกเลิกได้ด้วย: hotel-repair cancel {}", ticket.request_number);
        }
    }
    Ok(())
}

async fn handle_self_cancel(context: &CliContext, args: SelfCancelArgs, json: bool) -> Result<()> {
    let ticket = context.service.track_ticket(&args.number).await?;

    let prompt = format!(
        "ยืนยันการยกเลิก {}? (สามารถยกเลิกได้เฉพาะคำขอที่มีสถานะ \"รอดำเนินการ\" เท่านั้น)",
        ticket.request_number
    );
    if !confirm(&prompt, args.yes)? {
        println!("ไม่ได้ยกเลิก");
        return Ok(());
    }

    let cancelled = context.service.cancel_own_ticket(&ticket).await?;
    if json {
        print_json(&cancelled)?;
    } else {
        println!("ยกเลิกการแจ้งซ่อมเรียบร้อยแล้ว");
        render_ticket_line(&cancelled);
    }
    Ok(())
}

async fn handle_admin_command(
    context: &CliContext,
    command: AdminCommands,
    json: bool,
) -> Result<()> {
    match command {
        AdminCommands::Login(args) => handle_login(context, args, json).await,
        AdminCommands::Logout => {
            context.service.logout().await?;
            println!("ออกจากระบบแล้ว");
            Ok(())
        }
        AdminCommands::List(args) => handle_list(context, args, json).await,
        AdminCommands::Update(args) => {
            let ticket = context.service.track_ticket(&args.number).await?;
            let updated = context
                .service
                .update_status(&ticket, args.status, args.notes)
                .await?;
            render_update(&updated, json)
        }
        AdminCommands::Accept(arg) => {
            run_quick_action(context, &arg.number, QuickAction::Accept, true, json).await
        }
        AdminCommands::Complete(arg) => {
            run_quick_action(context, &arg.number, QuickAction::Complete, true, json).await
        }
        AdminCommands::Cancel(arg) => {
            run_quick_action(context, &arg.number, QuickAction::Cancel, arg.yes, json).await
        }
        AdminCommands::Delete(arg) => {
            run_quick_action(context, &arg.number, QuickAction::Delete, arg.yes, json).await
        }
        AdminCommands::Dashboard(args) => handle_dashboard(context, args, json).await,
        AdminCommands::Report(args) => handle_report(context, args, json).await,
        AdminCommands::Months => {
            let months = context.service.available_months().await?;
            if json {
                print_json(&months)?;
            } else if months.is_empty() {
                println!("ไม่มีข้อมูล");
            } else {
                for month in &months {
                    println!("- {}-{:02}  {}", month.year, month.month, reports::month_option_label(month));
                }
            }
            Ok(())
        }
    }
}

async fn handle_login(context: &CliContext, args: LoginArgs, json: bool) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_line("Password: ")?,
    };

    let admin = context
        .service
        .login(LoginRequest::new(args.username, password))
        .await?;

    if json {
        print_json(&admin)?;
    } else {
        println!("ยินดีต้อนรับ, {}", admin.display_name());
        if let Some(store) = &context.session_store {
            println!("Session saved to {}", store.path().display());
        }
    }
    Ok(())
}

async fn handle_list(context: &CliContext, args: ListArgs, json: bool) -> Result<()> {
    let filter = AdminTicketFilter {
        status: args.status,
        equipment_type: args.equipment,
        department: args.department,
        page: args.page.max(1),
        limit: context.config.admin_page_size,
    };

    let Some(page) = context.service.list_tickets(&filter).await? else {
        return Ok(());
    };

    if json {
        return print_json(&page);
    }

    if page.data.is_empty() {
        println!("ไม่มีรายการ");
        return Ok(());
    }
    for ticket in &page.data {
        render_ticket_line(ticket);
        let actions: Vec<String> = QuickAction::available_for(ticket)
            .iter()
            .map(|a| a.to_string())
            .collect();
        if !actions.is_empty() {
            println!("    actions: {}", actions.join(", "));
        }
    }
    render_pagination(&page);
    Ok(())
}

async fn run_quick_action(
    context: &CliContext,
    number: &str,
    action: QuickAction,
    confirmed: bool,
    json: bool,
) -> Result<()> {
    let ticket = context.service.track_ticket(number).await?;

    if action.is_destructive() || action == QuickAction::Cancel {
        let prompt = if action.is_destructive() {
            format!("คุณแน่ใจหรือไม่ที่จะลบ {}? การลบจะไม่สามารถกู้คืนได้", ticket.request_number)
        } else {
            format!("ยืนยันการยกเลิก {}?", ticket.request_number)
        };
        if !confirm(&prompt, confirmed)? {
            println!("ยกเลิกการดำเนินการ");
            return Ok(());
        }
    }

    match context.service.quick_action(&ticket, action).await? {
        QuickActionOutcome::Updated(updated) => render_update(&updated, json),
        QuickActionOutcome::Deleted(id) => {
            if json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("ลบรายการสำเร็จ!");
            }
            Ok(())
        }
    }
}

async fn handle_dashboard(context: &CliContext, args: DashboardArgs, json: bool) -> Result<()> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let Some(stats) = context.service.daily_dashboard(date).await? else {
        return Ok(());
    };

    if json {
        return print_json(&stats);
    }
    render_dashboard(date, &stats);
    Ok(())
}

async fn handle_report(context: &CliContext, args: ReportArgs, json: bool) -> Result<()> {
    let Some(report) = context.service.monthly_report(args.month, args.year).await? else {
        return Ok(());
    };

    let mut query = MonthlyRequestsQuery::new(args.month, args.year);
    query.page = args.page.max(1);
    query.limit = context.config.report_page_size;
    query.sort_by = args.sort_by.map(Into::into);
    query.sort_order = args.sort_order.map(Into::into);
    let requests = context.service.monthly_requests(&query).await?;

    if json {
        #[derive(Serialize)]
        struct ReportOutput<'a> {
            report: &'a MonthlyReport,
            requests: Option<&'a Paginated<RepairTicket>>,
        }
        return print_json(&ReportOutput {
            report: &report,
            requests: requests.as_ref(),
        });
    }

    render_report(&report);
    if let Some(page) = requests {
        println!();
        println!("รายการคำขอทั้งหมด ({} รายการ)", report.total_requests);
        for ticket in &page.data {
            println!(
                "- {} • {} • {} • {} • {} • เสร็จ {}",
                ticket.request_number,
                ticket.department,
                ticket.equipment_type,
                ticket.title,
                ticket.status.label(),
                reports::completion_date_label(ticket)
            );
        }
        render_pagination(&page);
    }
    Ok(())
}

fn handle_status(context: &CliContext, json: bool) -> Result<()> {
    let session = context.service.session();
    let status = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": env!("GIT_HASH"),
        "build_time": env!("BUILD_TIME"),
        "api_url": context.config.api_url,
        "environment": context.config.environment,
        "logged_in_as": session.admin().map(|a| a.username),
    });

    if json {
        return print_json(&status);
    }

    println!(
        "hotel-repair {} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIME")
    );
    println!("API: {}", context.config.api_url);
    match session.admin() {
        Some(admin) => println!("Logged in as {} ({})", admin.display_name(), admin.username),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn render_update(ticket: &RepairTicket, json: bool) -> Result<()> {
    if json {
        return print_json(ticket);
    }
    println!("อัพเดทสำเร็จ!");
    render_ticket_line(ticket);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_ticket_line(ticket: &RepairTicket) {
    println!(
        "- {} • {} • {} • {} • {}",
        ticket.request_number,
        ticket.status.label(),
        ticket.department,
        ticket.equipment_type,
        ticket.title
    );
}

fn render_ticket_detail(ticket: &RepairTicket) {
    println!("รหัสคำขอ: {}", ticket.request_number);
    println!("สถานะ: {}", ticket.status.label());
    println!("หัวข้อ: {}", ticket.title);
    println!("แผนก: {}", ticket.department);
    println!("อุปกรณ์: {}", ticket.equipment_type);
    println!("ผู้แจ้ง: {}", ticket.reporter_name);
    if let Some(location) = &ticket.location {
        println!("สถานที่: {location}");
    }
    println!("รายละเอียด: {}", ticket.problem_description);
    println!("วันที่แจ้ง: {}", ticket.created_at.with_timezone(&Local).format("%d/%m/%Y %H:%M"));

    if !ticket.status_history.is_empty() {
        println!();
        println!("ประวัติการเปลี่ยนสถานะ:");
        for entry in &ticket.status_history {
            let from = entry
                .old_status
                .map(|s| format!("{} → ", s.label()))
                .unwrap_or_default();
            let by = entry
                .changed_by
                .as_ref()
                .map(|who| format!(" โดย {}", who.display_name()))
                .unwrap_or_default();
            let notes = entry
                .notes
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default();
            println!(
                "  • {} {}{}{}{}",
                entry.changed_at.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                from,
                entry.new_status.label(),
                by,
                notes
            );
        }
    }
}

fn render_pagination<T>(page: &Paginated<T>) {
    let p = page.pagination;
    let shown_to = (u64::from(p.page) * u64::from(p.limit)).min(p.total);
    println!(
        "หน้า {} / {} • แสดง {} จาก {} รายการ",
        p.page,
        p.total_pages.max(1),
        shown_to,
        p.total
    );
}

fn render_dashboard(date: NaiveDate, stats: &DailyStats) {
    println!("สรุปประจำวันที่ {}", date.format("%d/%m/%Y"));
    println!("ทั้งหมด: {} รายการ", stats.total_requests);

    let by_status = aggregation::with_known_categories(&stats.by_status, aggregation::status_labels());
    for status in [
        TicketStatus::Pending,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ] {
        let count = by_status.get(status.label()).copied().unwrap_or(0);
        println!("  {}: {}", status.label(), count);
    }

    let by_equipment =
        aggregation::with_known_categories(&stats.by_equipment_type, aggregation::equipment_labels());
    println!("ตามอุปกรณ์:");
    for (kind, count) in &by_equipment {
        println!("  {kind}: {count}");
    }

    if !stats.by_department.is_empty() {
        println!("ตามแผนก:");
        for (dept, count) in &stats.by_department {
            println!("  {dept}: {count}");
        }
    }
}

fn render_report(report: &MonthlyReport) {
    println!("รายงานประจำเดือน {}", report.month_name);
    println!("ทั้งหมด: {} รายการ", report.total_requests);
    for status in [
        TicketStatus::Pending,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ] {
        println!("  {}: {}", status.label(), report.status.get(status));
    }

    println!("สถิติตามแผนก:");
    for row in &report.by_department {
        println!("  {}: {} ({}%)", row.label, row.count, row.formatted_percentage());
    }
    println!("สถิติตามอุปกรณ์:");
    for row in &report.by_equipment_type {
        println!("  {}: {} ({}%)", row.label, row.count, row.formatted_percentage());
    }
    if !report.by_department_equipment.is_empty() {
        println!("สถิติแยกตามแผนกและอุปกรณ์:");
        for (dept, cells) in &report.by_department_equipment {
            let line: Vec<String> = cells
                .iter()
                .map(|(kind, count)| format!("{kind} {count} ครั้ง"))
                .collect();
            println!("  {dept}: {}", line.join(", "));
        }
    }
}

/// Asks a yes/no question on stdin unless `assume_yes` is set.
fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let answer = prompt_line(&format!("{prompt} [y/N] "))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        return Err(anyhow!("no input available; pass --yes or the value as a flag"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<ServiceError>() {
        Some(service_err) => {
            eprintln!("เกิดข้อผิดพลาด: {}", service_err.user_message());
            debug!(error = ?err, "command failed");
        }
        None => eprintln!("error: {err:#}"),
    }
}
