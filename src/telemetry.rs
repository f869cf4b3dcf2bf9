use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::{
    Resource, metrics::SdkMeterProvider, trace::Sampler, trace::SdkTracerProvider,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

/// Exporters installed by [`init`]; flushed on [`Telemetry::shutdown`].
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

// Initialize tracing plus OTLP export for traces and metrics.
pub async fn init(service_name: &str) -> Telemetry {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Traces over gRPC. Without an exporter we still log locally.
    let tracer_provider = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
    {
        Ok(exporter) => {
            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(resource.clone())
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
                .build();
            global::set_tracer_provider(provider.clone());
            Some(provider)
        }
        Err(_e) => None,
    };

    let meter_provider = match opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .build()
    {
        Ok(exporter) => {
            let provider = SdkMeterProvider::builder()
                .with_periodic_exporter(exporter)
                .with_resource(resource)
                .build();
            global::set_meter_provider(provider.clone());
            Some(provider)
        }
        Err(_e) => None,
    };

    install_subscriber(service_name, tracer_provider.as_ref());
    Telemetry {
        tracer_provider,
        meter_provider,
    }
}

impl Telemetry {
    pub fn shutdown(self) {
        if let Some(provider) = self.meter_provider {
            let _ = provider.shutdown();
        }
        if let Some(provider) = self.tracer_provider {
            let _ = provider.shutdown();
        }
    }
}

fn install_subscriber(service_name: &str, tracer_provider: Option<&SdkTracerProvider>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,tonic=warn")
    });

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let base = Registry::default().with(env_filter).with(fmt_layer);

    if let Some(provider) = tracer_provider {
        let tracer = provider.tracer(service_name.to_string());
        let _ = base
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init();
        debug!("tracing subscriber with OTEL layer installed");
    } else {
        let _ = base.try_init();
        debug!("tracing subscriber installed (no OTEL layer)");
    }
}
