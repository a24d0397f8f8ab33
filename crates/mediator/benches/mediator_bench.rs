use async_trait::async_trait;
use common::{AggregateId, MessageHeader};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mediator::{
    Command, CommandHandler, CommandPipeline, CommandResult, DomainNotification, Mediator,
    MediatorScope, NotificationContext, Result, ValidationResult, Validator,
};

use std::sync::LazyLock;

struct Rename {
    header: MessageHeader,
    id: AggregateId,
    name: String,
}

static RULES: LazyLock<Validator<Rename>> = LazyLock::new(|| {
    Validator::new()
        .rule("Name", |c: &Rename| !c.name.is_empty(), "Name is required")
        .rule("Name", |c: &Rename| c.name.len() <= 100, "Name is too long")
});

impl Command for Rename {
    type Output = AggregateId;

    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn aggregate_id(&self) -> AggregateId {
        self.id
    }

    fn validate(&self) -> ValidationResult {
        RULES.validate(self)
    }
}

struct RenameHandler;

#[async_trait]
impl CommandHandler<Rename> for RenameHandler {
    async fn handle(&self, command: Rename, scope: &MediatorScope) -> Result<CommandResult<AggregateId>> {
        let mut pipeline = CommandPipeline::new(scope, "Bench", command.id);
        if !pipeline.validate(&command).await? {
            return Ok(pipeline.halt());
        }
        Ok(pipeline.complete(command.id))
    }
}

fn rename(name: &str) -> Rename {
    Rename {
        header: MessageHeader::command(),
        id: AggregateId::new(),
        name: name.to_string(),
    }
}

fn bench_send(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mediator = Mediator::builder().command(RenameHandler).try_build().unwrap();

    c.bench_function("mediator/send_valid", |b| {
        b.to_async(&rt).iter(|| async {
            let scope = mediator.scope();
            scope.send(rename("Ada")).await.unwrap();
        });
    });

    c.bench_function("mediator/send_invalid", |b| {
        b.to_async(&rt).iter(|| async {
            let scope = mediator.scope();
            scope.send(rename("")).await.unwrap();
            scope.finish();
        });
    });
}

fn bench_notifications(c: &mut Criterion) {
    let mut group = c.benchmark_group("mediator/notifications");
    let id = AggregateId::new();

    for count in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let context = NotificationContext::new();
                for _ in 0..count {
                    context.add(DomainNotification::new(id, "Bench", "Name is required"));
                }
                context.messages()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_send, bench_notifications);
criterion_main!(benches);
