mod fault_isolation;
mod lifecycle;
mod origin_filter;
mod pcap_flow;
mod pipeline_flow;
