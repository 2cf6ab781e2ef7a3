//! Well-known service names for NetFlow protocol tables.

pub const ICMP: u8 = 1;
pub const TCP: u8 = 6;
pub const UDP: u8 = 17;
pub const ICMPV6: u8 = 58;
pub const SCTP: u8 = 132;

const SERVICES: &[(u8, u16, &str)] = &[
    (TCP, 20, "ftp-data"),
    (TCP, 21, "ftp"),
    (TCP, 22, "ssh"),
    (TCP, 23, "telnet"),
    (TCP, 25, "smtp"),
    (TCP, 53, "domain"),
    (UDP, 53, "domain"),
    (UDP, 67, "bootps"),
    (UDP, 68, "bootpc"),
    (UDP, 69, "tftp"),
    (TCP, 80, "http"),
    (TCP, 88, "kerberos"),
    (UDP, 88, "kerberos"),
    (TCP, 110, "pop3"),
    (UDP, 123, "ntp"),
    (TCP, 135, "epmap"),
    (UDP, 137, "netbios-ns"),
    (UDP, 138, "netbios-dgm"),
    (TCP, 139, "netbios-ssn"),
    (TCP, 143, "imap"),
    (UDP, 161, "snmp"),
    (UDP, 162, "snmptrap"),
    (TCP, 179, "bgp"),
    (TCP, 389, "ldap"),
    (UDP, 389, "ldap"),
    (TCP, 443, "https"),
    (UDP, 443, "https"),
    (TCP, 445, "microsoft-ds"),
    (UDP, 500, "isakmp"),
    (UDP, 514, "syslog"),
    (TCP, 587, "submission"),
    (TCP, 636, "ldaps"),
    (TCP, 853, "domain-s"),
    (TCP, 993, "imaps"),
    (TCP, 995, "pop3s"),
    (TCP, 1433, "ms-sql-s"),
    (UDP, 1812, "radius"),
    (UDP, 1813, "radius-acct"),
    (TCP, 1883, "mqtt"),
    (UDP, 2055, "netflow"),
    (TCP, 3306, "mysql"),
    (TCP, 3389, "ms-wbt-server"),
    (UDP, 4739, "ipfix"),
    (UDP, 5353, "mdns"),
    (TCP, 5432, "postgresql"),
    (TCP, 5900, "vnc"),
    (TCP, 6379, "redis"),
    (UDP, 6343, "sflow"),
    (TCP, 8080, "http-alt"),
    (TCP, 8883, "secure-mqtt"),
    (TCP, 9200, "elasticsearch"),
];

/// IANA keyword for an IP protocol number.
pub fn protocol_name(protocol: u8) -> String {
    match protocol {
        ICMP => "icmp".to_string(),
        2 => "igmp".to_string(),
        TCP => "tcp".to_string(),
        UDP => "udp".to_string(),
        47 => "gre".to_string(),
        50 => "esp".to_string(),
        51 => "ah".to_string(),
        ICMPV6 => "ipv6-icmp".to_string(),
        89 => "ospf".to_string(),
        SCTP => "sctp".to_string(),
        other => other.to_string(),
    }
}

pub fn lookup(protocol: u8, port: u16) -> Option<&'static str> {
    SERVICES
        .iter()
        .find(|(p, n, _)| *p == protocol && *n == port)
        .map(|(_, _, name)| *name)
}

/// Label a flow by service. When both ports are known the lower one wins;
/// unknown ports fall back to `"<lower port>/<protocol>"`. Port-less
/// protocols are labelled by protocol name alone.
pub fn service_name(protocol: u8, src_port: u16, dst_port: u16) -> String {
    if !matches!(protocol, TCP | UDP | SCTP) {
        return protocol_name(protocol);
    }

    let (low, high) = if src_port <= dst_port {
        (src_port, dst_port)
    } else {
        (dst_port, src_port)
    };

    match (lookup(protocol, low), lookup(protocol, high)) {
        (Some(name), _) | (None, Some(name)) => name.to_string(),
        (None, None) => format!("{}/{}", low, protocol_name(protocol)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ports_resolve_either_direction() {
        assert_eq!(service_name(TCP, 51234, 443), "https");
        assert_eq!(service_name(TCP, 443, 51234), "https");
        assert_eq!(service_name(UDP, 53, 40000), "domain");
    }

    #[test]
    fn lower_port_wins_when_both_known() {
        assert_eq!(service_name(TCP, 8080, 22), "ssh");
        assert_eq!(service_name(TCP, 80, 3306), "http");
    }

    #[test]
    fn unknown_ports_fall_back_to_lower_port() {
        assert_eq!(service_name(TCP, 40000, 31337), "31337/tcp");
        assert_eq!(service_name(UDP, 0, 0), "0/udp");
    }

    #[test]
    fn portless_protocols_use_protocol_name() {
        assert_eq!(service_name(ICMP, 0, 0x0303), "icmp");
        assert_eq!(service_name(47, 0, 0), "gre");
        assert_eq!(service_name(253, 0, 0), "253");
    }
}
