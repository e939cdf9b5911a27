use clap::{Args, Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

/// Staff console for the restaurant server
#[derive(Parser, Debug)]
#[command(name = "restaurant-client")]
#[command(about = "client cli used by restaurant staffs to interact with the server", version, long_about = None
)]
struct Cli {
    #[arg(long, default_value = "http://localhost:8080")]
    host: String,
    #[arg(long, default_value = "staff-cli")]
    staff_id: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// order related ops
    #[command(arg_required_else_help = true)]
    Orders(OrdersArgs),
    /// bill related ops
    #[command(arg_required_else_help = true)]
    Bills(BillsArgs),
    /// booking related ops
    #[command(arg_required_else_help = true)]
    Bookings(BookingsArgs),
    /// follow the admin room until interrupted
    Watch,
}

#[derive(Debug, Args)]
struct OrdersArgs {
    #[command(subcommand)]
    command: OrderCmds,
}

#[derive(Debug, Subcommand)]
enum OrderCmds {
    List {
        #[arg(long, help = "Only orders in this status, e.g. ready")]
        status: Option<String>,
    },
    #[command(arg_required_else_help = true)]
    Status { id: String, status: String },
}

#[derive(Debug, Args)]
struct BillsArgs {
    #[command(subcommand)]
    command: BillCmds,
}

#[derive(Debug, Subcommand)]
enum BillCmds {
    List,
    #[command(arg_required_else_help = true)]
    Create {
        #[arg(help = "Orders to put on the bill", value_name = "ORDER_IDs", num_args = 1..)]
        order_ids: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    #[command(arg_required_else_help = true)]
    Pay {
        id: String,
        #[arg(long = "ref", help = "Payment reference, e.g. a UPI transaction id")]
        payment_ref: String,
    },
}

#[derive(Debug, Args)]
struct BookingsArgs {
    #[command(subcommand)]
    command: BookingCmds,
}

#[derive(Debug, Subcommand)]
enum BookingCmds {
    List,
    #[command(arg_required_else_help = true)]
    Status { id: String, status: String },
}

#[derive(Debug, Deserialize)]
struct Refusal {
    result_code: String,
    message: String,
}

struct Api {
    client: Client,
    host: String,
    staff_id: String,
}

impl Api {
    fn request(&self, build: impl FnOnce(&Client, String) -> RequestBuilder, path: &str) -> RequestBuilder {
        build(&self.client, format!("{}/{}", self.host, path))
            .header("x-principal-role", "staff")
            .header("x-principal-id", &self.staff_id)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Option<Value>, anyhow::Error> {
        let res = req.send().await?;
        match res.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(Some(res.json::<Value>().await?)),
            status => {
                report_refusal(status, res).await;
                Ok(None)
            }
        }
    }
}

async fn report_refusal(status: StatusCode, res: Response) {
    match res.json::<Refusal>().await {
        Ok(refusal) => println!("refused ({}, {}): {}", status, refusal.result_code, refusal.message),
        Err(_) => println!("got unexpected status code, {}", status),
    }
}

fn money(value: &Value) -> String {
    value.as_f64().map(|v| format!("{v:.2}")).unwrap_or_else(|| value.to_string())
}

fn print_order(order: &Value) {
    println!(
        "{}  {:<8} {:<16} table={:<5} total={:>9} bill={}",
        order["id"].as_str().unwrap_or("?"),
        order["type"].as_str().unwrap_or("?"),
        order["status"].as_str().unwrap_or("?"),
        order["tableId"].as_str().unwrap_or("-"),
        money(&order["total"]),
        order["billId"].as_str().unwrap_or("-"),
    );
}

fn print_bill(bill: &Value) {
    println!(
        "{}  {:<6} orders={} total={:>9} ref={}",
        bill["id"].as_str().unwrap_or("?"),
        bill["status"].as_str().unwrap_or("?"),
        bill["orderIds"].as_array().map_or(0, Vec::len),
        money(&bill["total"]),
        bill["paymentRef"].as_str().unwrap_or("-"),
    );
}

fn print_booking(booking: &Value) {
    println!(
        "{}  {:<5} {:<9} {} {} guests={} {}",
        booking["id"].as_str().unwrap_or("?"),
        booking["bookingType"].as_str().unwrap_or("?"),
        booking["status"].as_str().unwrap_or("?"),
        booking["date"].as_str().unwrap_or("?"),
        booking["time"].as_str().unwrap_or("?"),
        booking["guests"],
        booking["customerName"].as_str().unwrap_or(""),
    );
}

fn rows<'a>(listing: &'a Value, key: &str) -> &'a [Value] {
    listing[key].as_array().map(Vec::as_slice).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();
    let api = Api {
        client: Client::new(),
        host: args.host.trim_end_matches('/').to_string(),
        staff_id: args.staff_id,
    };

    match args.command {
        Commands::Orders(orders) => match orders.command {
            OrderCmds::List { status } => {
                let path = match status {
                    Some(status) => format!("v1/orders?status={status}&pageSize=100"),
                    None => "v1/orders?pageSize=100".to_string(),
                };
                if let Some(listing) = api.send(api.request(Client::get, &path)).await? {
                    rows(&listing, "orders").iter().for_each(print_order);
                }
            }
            OrderCmds::Status { id, status } => {
                let req = api
                    .request(Client::patch, &format!("v1/order/{id}/status"))
                    .json(&json!({ "status": status }));
                if let Some(order) = api.send(req).await? {
                    println!("order {} is now {}", id, order["status"].as_str().unwrap_or("?"));
                }
            }
        },
        Commands::Bills(bills) => match bills.command {
            BillCmds::List => {
                if let Some(listing) = api.send(api.request(Client::get, "v1/bills?pageSize=100")).await? {
                    rows(&listing, "bills").iter().for_each(print_bill);
                }
            }
            BillCmds::Create { order_ids, notes } => {
                println!("billing {} orders", order_ids.len());
                let req = api
                    .request(Client::post, "v1/bills")
                    .json(&json!({ "orderIds": order_ids, "notes": notes }));
                if let Some(bill) = api.send(req).await? {
                    print_bill(&bill);
                }
            }
            BillCmds::Pay { id, payment_ref } => {
                let req = api
                    .request(Client::patch, &format!("v1/bill/{id}/paid"))
                    .json(&json!({ "paymentRef": payment_ref }));
                if let Some(bill) = api.send(req).await? {
                    println!("bill {} paid, ref={}", id, bill["paymentRef"].as_str().unwrap_or("?"));
                }
            }
        },
        Commands::Bookings(bookings) => match bookings.command {
            BookingCmds::List => {
                if let Some(listing) = api.send(api.request(Client::get, "v1/bookings?pageSize=100")).await? {
                    rows(&listing, "bookings").iter().for_each(print_booking);
                }
            }
            BookingCmds::Status { id, status } => {
                let req = api
                    .request(Client::patch, &format!("v1/booking/{id}/status"))
                    .json(&json!({ "status": status }));
                if let Some(booking) = api.send(req).await? {
                    println!("booking {} is now {}", id, booking["status"].as_str().unwrap_or("?"));
                }
            }
        },
        Commands::Watch => watch(&api).await?,
    };
    Ok(())
}

/// Prints each admin-room event until the stream ends or ctrl-c.
async fn watch(api: &Api) -> Result<(), anyhow::Error> {
    let mut res = api.request(Client::get, "v1/events/admin").send().await?;
    if res.status() != StatusCode::OK {
        report_refusal(res.status(), res).await;
        return Ok(());
    }
    println!("watching the admin room, ctrl-c to stop");
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let chunk = tokio::select! {
            chunk = res.chunk() => chunk?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        let Some(chunk) = chunk else {
            println!("server closed the stream");
            return Ok(());
        };
        pending.extend_from_slice(&chunk);
        for frame in take_frames(&mut pending) {
            match parse_frame(&frame) {
                Ok(Some(notification)) => println!(
                    "[{}] {} {}",
                    notification["publishedAt"].as_str().unwrap_or("?"),
                    notification["event"].as_str().unwrap_or("?"),
                    notification["data"]["id"].as_str().unwrap_or("?"),
                ),
                Ok(None) => {} // keep-alive
                Err(e) => eprintln!("skipping a frame, {}", e),
            }
        }
    }
}

/// Removes every complete `\n\n`-terminated frame from `pending`. A chunk may
/// end mid-character, so bytes are only decoded once their frame is whole.
fn take_frames(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    while let Some(end) = pending.windows(2).position(|w| w == b"\n\n") {
        frames.push(pending.drain(..end + 2).collect());
    }
    frames
}

fn parse_frame(frame: &[u8]) -> Result<Option<Value>, String> {
    let frame = std::str::from_utf8(frame).map_err(|e| format!("not utf-8, {e}"))?;
    let Some(data) = frame.lines().find_map(|l| l.strip_prefix("data: ")) else {
        return Ok(None);
    };
    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| format!("malformed data, {e}: {data}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_mid_character_decode_once_whole() {
        let frame = "event: order.created\ndata: {\"event\":\"order.created\",\"data\":{\"id\":\"o1\",\"note\":\"₹ extra\"}}\n\n";
        let bytes = frame.as_bytes();
        let rupee = frame.find('₹').unwrap();
        let mut pending = Vec::new();

        pending.extend_from_slice(&bytes[..rupee + 1]);
        assert!(take_frames(&mut pending).is_empty());
        pending.extend_from_slice(&bytes[rupee + 1..]);
        pending.extend_from_slice(b": keep-alive\n\n");

        let frames = take_frames(&mut pending);
        assert_eq!(frames.len(), 2);
        assert!(pending.is_empty());
        let notification = parse_frame(&frames[0]).unwrap().unwrap();
        assert_eq!(notification["data"]["note"], "₹ extra");
        assert_eq!(parse_frame(&frames[1]), Ok(None));
    }

    #[test]
    fn a_bad_frame_is_reported_not_fatal() {
        assert!(parse_frame(b"event: x\ndata: {not json\n\n").is_err());
        assert!(parse_frame(&[0xe2, 0x82, b'\n', b'\n']).is_err());
    }
}
